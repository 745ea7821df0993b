//! Strategy contract and the closed set of strategy variants.
//!
//! A strategy reads bars and precomputed indicators up to and including a
//! given index and may propose a [`Signal`] for that bar. Everything a
//! strategy needs is declared through [`SignalRule::required_indicators`] so
//! the engine computes each series once per run.

pub mod bollinger_squeeze;
pub mod ema_crossover;
pub mod rsi_divergence;
pub mod volume_breakout;

pub use bollinger_squeeze::{BollingerSqueeze, BollingerSqueezeParams};
pub use ema_crossover::{EmaCrossover, EmaCrossoverParams};
pub use rsi_divergence::{RsiDivergence, RsiDivergenceParams};
pub use volume_breakout::{VolumeBreakout, VolumeBreakoutParams};

use crate::domain::error::SigtraderError;
use crate::domain::indicator::{compute_indicators, IndicatorMap, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::risk::{take_profit_for, RiskConfig};
use crate::domain::signal::{Direction, Rationale, Signal, StrategyId};
use crate::ports::config_port::ConfigPort;

pub trait SignalRule {
    fn id(&self) -> StrategyId;

    fn required_indicators(&self) -> Vec<IndicatorType>;

    /// Bars needed before `evaluate` can return a signal.
    fn warmup_bars(&self) -> usize;

    /// Evaluates the bar at `index`. Must not read `bars` or indicator values past `index`.
    fn evaluate(
        &self,
        bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
    ) -> Option<Signal>;

    /// Stop level for an entry at `entry_price`, using data up to `index`.
    fn stop_loss_at(
        &self,
        bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
        direction: Direction,
        entry_price: f64,
    ) -> Option<f64>;

    fn risk_reward_ratio(&self, risk: &RiskConfig) -> f64 {
        risk.risk_reward_ratio
    }

    /// Evaluates the last bar of `window`.
    fn generate_signal(&self, window: &[OhlcvBar]) -> Option<Signal> {
        let index = window.len().checked_sub(1)?;
        let indicators = compute_indicators(window, &self.required_indicators());
        self.evaluate(window, &indicators, index)
    }

    fn calculate_stop_loss(&self, signal: &Signal, window: &[OhlcvBar]) -> Option<f64> {
        let index = window.len().checked_sub(1)?;
        let indicators = compute_indicators(window, &self.required_indicators());
        self.stop_loss_at(window, &indicators, index, signal.direction, signal.entry_price)
    }

    fn calculate_take_profit(
        &self,
        signal: &Signal,
        window: &[OhlcvBar],
        risk: &RiskConfig,
    ) -> Option<f64> {
        let stop = self.calculate_stop_loss(signal, window)?;
        take_profit_for(
            signal.direction,
            signal.entry_price,
            stop,
            self.risk_reward_ratio(risk),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    VolumeBreakout(VolumeBreakout),
    RsiDivergence(RsiDivergence),
    BollingerSqueeze(BollingerSqueeze),
    EmaCrossover(EmaCrossover),
}

impl Strategy {
    /// Builds a strategy from its config section, falling back to defaults per key.
    pub fn from_config(id: StrategyId, config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        Ok(match id {
            StrategyId::VolumeBreakout => Strategy::VolumeBreakout(VolumeBreakout::new(
                VolumeBreakoutParams::from_config(config)?,
            )?),
            StrategyId::RsiDivergence => Strategy::RsiDivergence(RsiDivergence::new(
                RsiDivergenceParams::from_config(config)?,
            )?),
            StrategyId::BollingerSqueeze => Strategy::BollingerSqueeze(BollingerSqueeze::new(
                BollingerSqueezeParams::from_config(config)?,
            )?),
            StrategyId::EmaCrossover => Strategy::EmaCrossover(EmaCrossover::new(
                EmaCrossoverParams::from_config(config)?,
            )?),
        })
    }

    pub fn with_defaults(id: StrategyId) -> Self {
        match id {
            StrategyId::VolumeBreakout => Strategy::VolumeBreakout(VolumeBreakout::default()),
            StrategyId::RsiDivergence => Strategy::RsiDivergence(RsiDivergence::default()),
            StrategyId::BollingerSqueeze => Strategy::BollingerSqueeze(BollingerSqueeze::default()),
            StrategyId::EmaCrossover => Strategy::EmaCrossover(EmaCrossover::default()),
        }
    }

    fn rule(&self) -> &dyn SignalRule {
        match self {
            Strategy::VolumeBreakout(s) => s,
            Strategy::RsiDivergence(s) => s,
            Strategy::BollingerSqueeze(s) => s,
            Strategy::EmaCrossover(s) => s,
        }
    }
}

impl SignalRule for Strategy {
    fn id(&self) -> StrategyId {
        self.rule().id()
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        self.rule().required_indicators()
    }

    fn warmup_bars(&self) -> usize {
        self.rule().warmup_bars()
    }

    fn evaluate(
        &self,
        bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
    ) -> Option<Signal> {
        self.rule().evaluate(bars, indicators, index)
    }

    fn stop_loss_at(
        &self,
        bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
        direction: Direction,
        entry_price: f64,
    ) -> Option<f64> {
        self.rule()
            .stop_loss_at(bars, indicators, index, direction, entry_price)
    }

    fn risk_reward_ratio(&self, risk: &RiskConfig) -> f64 {
        self.rule().risk_reward_ratio(risk)
    }
}

/// Reads a simple indicator value, `None` if the series is missing or still warming up.
pub(crate) fn simple_at(
    indicators: &IndicatorMap,
    key: &IndicatorType,
    index: usize,
) -> Option<f64> {
    indicators.get(key)?.simple(index)
}

/// Builds the signal for the bar at `index`, entering at its close.
pub(crate) fn signal_at(
    rule: &dyn SignalRule,
    bars: &[OhlcvBar],
    indicators: &IndicatorMap,
    index: usize,
    direction: Direction,
    rationale: Rationale,
) -> Option<Signal> {
    let bar = bars.get(index)?;
    let stop_loss = rule.stop_loss_at(bars, indicators, index, direction, bar.close)?;
    Some(Signal {
        direction,
        entry_price: bar.close,
        timestamp: bar.timestamp,
        strategy_id: rule.id(),
        stop_loss,
        rationale,
    })
}

/// Shifts `level` away from entry by `buffer_pct` percent: down for longs, up for shorts.
pub(crate) fn buffered_stop(level: f64, direction: Direction, buffer_pct: f64) -> f64 {
    level * (1.0 - direction.multiplier() * buffer_pct / 100.0)
}

pub(crate) fn require_positive(section: &str, key: &str, value: f64) -> Result<(), SigtraderError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SigtraderError::invalid(section, key, format!("{} must be positive", key)))
    }
}

pub(crate) fn require_period(section: &str, key: &str, value: usize) -> Result<(), SigtraderError> {
    if value > 0 {
        Ok(())
    } else {
        Err(SigtraderError::invalid(section, key, format!("{} must be at least 1", key)))
    }
}

pub(crate) fn require_buffer(section: &str, key: &str, value: f64) -> Result<(), SigtraderError> {
    if (0.0..100.0).contains(&value) {
        Ok(())
    } else {
        Err(SigtraderError::invalid(section, key, format!("{} must be in [0, 100)", key)))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::{Duration, TimeZone, Utc};

    /// Bar at 10-minute step `i` with a symmetric 0.5 range around `close`.
    pub fn bar(i: usize, close: f64, volume: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(10 * i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume,
        }
    }
}
