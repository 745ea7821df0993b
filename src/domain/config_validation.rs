//! Typed configuration built from a [`ConfigPort`].
//!
//! Every value is validated before a run starts. Missing optional keys fall
//! back to defaults; present keys that do not parse are errors.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::SigtraderError;
use crate::domain::execution::{ExecutionConfig, ExecutionPolicy};
use crate::domain::risk::RiskConfig;
use crate::domain::signal::StrategyId;
use crate::domain::strategy::Strategy;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::Duration;

pub const DEFAULT_SYMBOLS: &str = "BTC/USDT,ETH/USDT,SOL/USDT,BNB/USDT,DOGE/USDT";
pub const DEFAULT_TIMEFRAME: &str = "10m";
pub const DEFAULT_DATA_DIR: &str = "data";

/// Everything a `backtest` or `signals` run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub backtest: BacktestConfig,
    pub risk: RiskConfig,
    pub timeframe: Duration,
    pub symbols: Vec<String>,
    pub strategies: Vec<Strategy>,
    pub data_dir: String,
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, SigtraderError> {
    Ok(RunConfig {
        backtest: load_backtest_config(config)?,
        risk: load_risk_config(config)?,
        timeframe: load_timeframe(config)?,
        symbols: load_symbols(config)?,
        strategies: load_strategies(config)?,
        data_dir: config
            .get_string("backtest", "data_dir")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
    })
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SigtraderError> {
    let initial_capital = config.get_f64("backtest", "initial_capital", 10_000.0)?;
    if initial_capital <= 0.0 {
        return Err(SigtraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let costs = ExecutionConfig {
        commission_per_trade: non_negative(config, "commission_per_trade")?,
        commission_pct: non_negative(config, "commission_pct")?,
        slippage_pct: non_negative(config, "slippage_pct")?,
    };

    let execution = config
        .require_string("backtest", "execution")?
        .parse::<ExecutionPolicy>()
        .map_err(|reason| SigtraderError::invalid("backtest", "execution", reason))?;

    Ok(BacktestConfig {
        initial_capital,
        execution,
        costs,
    })
}

fn non_negative(config: &dyn ConfigPort, key: &str) -> Result<f64, SigtraderError> {
    let value = config.get_f64("backtest", key, 0.0)?;
    if value < 0.0 {
        return Err(SigtraderError::invalid(
            "backtest",
            key,
            format!("{} must be non-negative", key),
        ));
    }
    Ok(value)
}

pub fn load_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, SigtraderError> {
    let d = RiskConfig::default();
    let risk = RiskConfig {
        max_position_fraction: config.get_f64(
            "risk",
            "max_position_fraction",
            d.max_position_fraction,
        )?,
        risk_reward_ratio: config.get_f64("risk", "risk_reward_ratio", d.risk_reward_ratio)?,
        lot_size: config.get_f64("risk", "lot_size", d.lot_size)?,
    };
    risk.validate()?;
    Ok(risk)
}

/// Parses `30s`, `10m`, `4h`, or `1d` style bar spacings.
pub fn parse_timeframe(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("timeframe '{}' has no unit", input))?;
    let (digits, unit) = input.split_at(split);
    let amount: i64 = digits
        .parse()
        .map_err(|_| format!("timeframe '{}' has no amount", input))?;
    if amount <= 0 {
        return Err(format!("timeframe '{}' must be positive", input));
    }
    let duration = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        other => return Err(format!("unknown timeframe unit '{}'", other)),
    };
    duration.ok_or_else(|| format!("timeframe '{}' out of range", input))
}

pub fn load_timeframe(config: &dyn ConfigPort) -> Result<Duration, SigtraderError> {
    let raw = config
        .get_string("backtest", "timeframe")
        .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string());
    parse_timeframe(&raw).map_err(|reason| SigtraderError::invalid("backtest", "timeframe", reason))
}

pub fn load_symbols(config: &dyn ConfigPort) -> Result<Vec<String>, SigtraderError> {
    let raw = config
        .get_string("backtest", "symbols")
        .unwrap_or_else(|| DEFAULT_SYMBOLS.to_string());
    parse_symbols(&raw).map_err(|e| SigtraderError::invalid("backtest", "symbols", e.to_string()))
}

/// Strategies listed in `[strategies] enabled`, all four when absent.
pub fn load_strategies(config: &dyn ConfigPort) -> Result<Vec<Strategy>, SigtraderError> {
    let ids: Vec<StrategyId> = match config.get_string("strategies", "enabled") {
        None => StrategyId::ALL.to_vec(),
        Some(raw) => {
            let mut ids = Vec::new();
            for token in raw.split(',') {
                let id = token
                    .parse::<StrategyId>()
                    .map_err(|reason| SigtraderError::invalid("strategies", "enabled", reason))?;
                if ids.contains(&id) {
                    return Err(SigtraderError::invalid(
                        "strategies",
                        "enabled",
                        format!("duplicate strategy '{}'", id),
                    ));
                }
                ids.push(id);
            }
            ids
        }
    };
    ids.into_iter()
        .map(|id| Strategy::from_config(id, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::strategy::SignalRule;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const MINIMAL: &str = "[backtest]\nexecution = next_open\n";

    #[test]
    fn minimal_config_uses_defaults() {
        let run = load_run_config(&adapter(MINIMAL)).unwrap();
        assert_eq!(run.backtest.execution, ExecutionPolicy::NextOpen);
        assert_eq!(run.backtest.initial_capital, 10_000.0);
        assert_eq!(run.risk, RiskConfig::default());
        assert_eq!(run.timeframe, Duration::minutes(10));
        assert_eq!(run.symbols.len(), 5);
        assert_eq!(run.strategies.len(), 4);
        assert_eq!(run.data_dir, "data");
    }

    #[test]
    fn execution_policy_is_required() {
        let err = load_backtest_config(&adapter("[backtest]\ninitial_capital = 5000\n")).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigMissing { ref key, .. } if key == "execution"));
    }

    #[test]
    fn unknown_execution_policy_rejected() {
        let err = load_backtest_config(&adapter("[backtest]\nexecution = vwap\n")).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn negative_costs_rejected() {
        let err = load_backtest_config(&adapter(
            "[backtest]\nexecution = current_close\nslippage_pct = -0.1\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("slippage_pct"));
    }

    #[test]
    fn non_numeric_capital_rejected() {
        let err = load_backtest_config(&adapter(
            "[backtest]\nexecution = next_open\ninitial_capital = lots\n",
        ))
        .unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { ref key, .. } if key == "initial_capital"));
    }

    #[test]
    fn risk_section_is_validated() {
        let err = load_risk_config(&adapter("[risk]\nmax_position_fraction = 0\n")).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { .. }));
        let risk = load_risk_config(&adapter("[risk]\nrisk_reward_ratio = 3\nlot_size = 0.01\n"))
            .unwrap();
        assert_eq!(risk.risk_reward_ratio, 3.0);
        assert_eq!(risk.lot_size, 0.01);
    }

    #[test]
    fn timeframe_units() {
        assert_eq!(parse_timeframe("10m"), Ok(Duration::minutes(10)));
        assert_eq!(parse_timeframe("4h"), Ok(Duration::hours(4)));
        assert_eq!(parse_timeframe("1d"), Ok(Duration::days(1)));
        assert_eq!(parse_timeframe("30s"), Ok(Duration::seconds(30)));
        assert!(parse_timeframe("10").is_err());
        assert!(parse_timeframe("m").is_err());
        assert!(parse_timeframe("0m").is_err());
        assert!(parse_timeframe("10w").is_err());
    }

    #[test]
    fn oversized_timeframe_is_config_invalid() {
        let err = parse_timeframe("9999999999999999m").unwrap_err();
        assert!(err.contains("out of range"));
        let err = load_timeframe(&adapter("[backtest]\ntimeframe = 9999999999999999m\n"))
            .unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { ref key, .. } if key == "timeframe"));
    }

    #[test]
    fn enabled_strategies_in_listed_order() {
        let strategies = load_strategies(&adapter(
            "[strategies]\nenabled = ema_crossover, volume_breakout\n",
        ))
        .unwrap();
        let ids: Vec<StrategyId> = strategies.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![StrategyId::EmaCrossover, StrategyId::VolumeBreakout]);
    }

    #[test]
    fn unknown_or_duplicate_strategy_rejected() {
        assert!(load_strategies(&adapter("[strategies]\nenabled = turtle\n")).is_err());
        assert!(load_strategies(&adapter(
            "[strategies]\nenabled = rsi_divergence,rsi_divergence\n"
        ))
        .is_err());
    }

    #[test]
    fn symbols_parsed_from_config() {
        let symbols = load_symbols(&adapter("[backtest]\nsymbols = sol/usdt, btc/usdt\n")).unwrap();
        assert_eq!(symbols, vec!["SOL/USDT", "BTC/USDT"]);
        assert!(load_symbols(&adapter("[backtest]\nsymbols = BTC/USDT,,\n")).is_err());
    }
}
