//! Bar-by-bar backtest engine.
//!
//! One replay drives one strategy over one series with at most one open
//! position. Each bar, in order:
//! 1. the bar must directly follow the previous one at the series timeframe;
//! 2. under [`ExecutionPolicy::NextOpen`] a pending signal fills at the open;
//! 3. an open position exits if the bar's range reaches its stop or target;
//! 4. when flat with nothing pending, the strategy is evaluated;
//! 5. an equity point is appended.
//!
//! A position still open after the last bar is closed at the last close.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, info};

use super::error::SigtraderError;
use super::execution::{
    apply_entry_slippage, calculate_commission, check_exit, close_position, spendable_capital,
    ExecutionConfig, ExecutionPolicy,
};
use super::indicator::{compute_indicators, IndicatorMap};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ExitReason, Position, Trade};
use super::risk::{Rejection, RiskManager};
use super::series::{check_step, Series};
use super::signal::{Direction, Signal, StrategyId};
use super::strategy::{SignalRule, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub execution: ExecutionPolicy,
    pub costs: ExecutionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ZeroSize,
    InvalidStopDistance,
    StopUndefined,
}

impl From<Rejection> for SkipReason {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::ZeroSize => SkipReason::ZeroSize,
            Rejection::InvalidStopDistance => SkipReason::InvalidStopDistance,
        }
    }
}

/// A signal the engine could not act on.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSignal {
    pub timestamp: DateTime<Utc>,
    pub strategy_id: StrategyId,
    pub direction: Direction,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy_id: StrategyId,
    pub initial_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub skipped: Vec<SkippedSignal>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }
}

struct Replay<'a> {
    series: &'a Series,
    strategy: &'a Strategy,
    risk: &'a RiskManager,
    config: &'a BacktestConfig,
    indicators: IndicatorMap,
    portfolio: Portfolio,
    skipped: Vec<SkippedSignal>,
}

impl<'a> Replay<'a> {
    fn new(
        series: &'a Series,
        strategy: &'a Strategy,
        risk: &'a RiskManager,
        config: &'a BacktestConfig,
    ) -> Self {
        let indicators = compute_indicators(series.bars(), &strategy.required_indicators());
        Replay {
            series,
            strategy,
            risk,
            config,
            indicators,
            portfolio: Portfolio::new(config.initial_capital),
            skipped: Vec::new(),
        }
    }

    fn run(mut self) -> Result<BacktestResult, SigtraderError> {
        let series = self.series;
        let bars = series.bars();
        let mut pending: Option<(usize, Signal)> = None;

        for (index, bar) in bars.iter().enumerate() {
            if index > 0 {
                check_step(&bars[index - 1], bar, series.timeframe, index)?;
            }

            if let Some((signal_index, signal)) = pending.take() {
                self.enter(signal_index, index, &signal, bar.open);
            }

            if let Some((reason, level)) =
                self.portfolio.position().and_then(|p| check_exit(p, bar))
            {
                self.exit(index, level, reason);
            }

            if self.portfolio.is_flat() && pending.is_none() {
                if let Some(signal) = self.strategy.evaluate(bars, &self.indicators, index) {
                    debug!(
                        strategy = %signal.strategy_id,
                        direction = %signal.direction,
                        timestamp = %signal.timestamp,
                        entry = signal.entry_price,
                        stop = signal.stop_loss,
                        "signal"
                    );
                    match self.config.execution {
                        ExecutionPolicy::CurrentClose => {
                            self.enter(index, index, &signal, bar.close)
                        }
                        ExecutionPolicy::NextOpen => pending = Some((index, signal)),
                    }
                }
            }

            self.portfolio.record_equity(bar.timestamp, bar.close);
        }

        if let Some((_, signal)) = pending {
            debug!(timestamp = %signal.timestamp, "dropping signal on final bar");
        }

        if let Some(last) = bars.last() {
            if !self.portfolio.is_flat() {
                self.exit(bars.len() - 1, last.close, ExitReason::ForcedClose);
                self.portfolio.restate_last_equity(last.close);
            }
        }

        Ok(BacktestResult {
            symbol: self.series.symbol.clone(),
            strategy_id: self.strategy.id(),
            initial_capital: self.config.initial_capital,
            trades: self.portfolio.trades,
            equity_curve: self.portfolio.equity_curve,
            skipped: self.skipped,
        })
    }

    /// Sizes and opens a position for `signal` filled at `market_price` on bar `fill_index`.
    fn enter(
        &mut self,
        signal_index: usize,
        fill_index: usize,
        signal: &Signal,
        market_price: f64,
    ) {
        let (series, config) = (self.series, self.config);
        let bars = series.bars();
        let costs = &config.costs;
        let direction = signal.direction;
        let fill_price = apply_entry_slippage(market_price, direction, costs.slippage_pct);

        let Some(stop_loss) =
            self.strategy
                .stop_loss_at(bars, &self.indicators, signal_index, direction, fill_price)
        else {
            self.skip(signal, SkipReason::StopUndefined);
            return;
        };

        let ratio = self.strategy.risk_reward_ratio(self.risk.config());
        let equity = self.portfolio.realized_equity();
        let available = spendable_capital(self.portfolio.cash, costs);
        let intent = match self
            .risk
            .plan(signal, fill_price, stop_loss, ratio, equity, available)
        {
            Ok(intent) => intent,
            Err(rejection) => {
                self.skip(signal, rejection.into());
                return;
            }
        };

        let entry_commission = calculate_commission(intent.size * intent.entry_price, costs);
        debug!(
            symbol = %series.symbol,
            direction = %direction,
            price = intent.entry_price,
            size = intent.size,
            stop = intent.stop_loss,
            target = intent.take_profit,
            "fill"
        );
        self.portfolio.open(Position {
            strategy_id: signal.strategy_id,
            symbol: series.symbol.clone(),
            direction,
            entry_price: intent.entry_price,
            size: intent.size,
            stop_loss: intent.stop_loss,
            take_profit: intent.take_profit,
            opened_at: bars[fill_index].timestamp,
            entry_index: fill_index,
            entry_commission,
        });
    }

    fn exit(&mut self, index: usize, level: f64, reason: ExitReason) {
        let closed_at = self.series.bars()[index].timestamp;
        if let Some(trade) = close_position(
            &mut self.portfolio,
            level,
            closed_at,
            index,
            reason,
            &self.config.costs,
        ) {
            debug!(
                symbol = %trade.symbol,
                reason = %trade.exit_reason,
                price = trade.exit_price,
                pnl = trade.realized_pnl,
                "exit"
            );
        }
    }

    fn skip(&mut self, signal: &Signal, reason: SkipReason) {
        debug!(
            strategy = %signal.strategy_id,
            timestamp = %signal.timestamp,
            ?reason,
            "skipped signal"
        );
        self.skipped.push(SkippedSignal {
            timestamp: signal.timestamp,
            strategy_id: signal.strategy_id,
            direction: signal.direction,
            reason,
        });
    }
}

/// Replays `strategy` over `series`.
///
/// Fails with a sequence error on the first duplicate, out-of-order, or
/// gapped bar.
pub fn run_backtest(
    series: &Series,
    strategy: &Strategy,
    risk: &RiskManager,
    config: &BacktestConfig,
) -> Result<BacktestResult, SigtraderError> {
    info!(
        symbol = %series.symbol,
        strategy = %strategy.id(),
        bars = series.len(),
        execution = %config.execution,
        "backtest start"
    );
    let result = Replay::new(series, strategy, risk, config).run()?;
    info!(
        symbol = %result.symbol,
        strategy = %result.strategy_id,
        trades = result.trades.len(),
        skipped = result.skipped.len(),
        final_equity = result.final_equity(),
        "backtest done"
    );
    Ok(result)
}

/// One independent (strategy, series) replay.
#[derive(Debug, Clone, Copy)]
pub struct BacktestJob<'a> {
    pub series: &'a Series,
    pub strategy: &'a Strategy,
}

/// Runs independent jobs in parallel. Results keep the input order.
pub fn run_many(
    jobs: &[BacktestJob<'_>],
    risk: &RiskManager,
    config: &BacktestConfig,
) -> Vec<Result<BacktestResult, SigtraderError>> {
    jobs.par_iter()
        .map(|job| run_backtest(job.series, job.strategy, risk, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::risk::RiskConfig;
    use crate::domain::strategy::{EmaCrossover, EmaCrossoverParams, VolumeBreakout};
    use chrono::{Duration, TimeZone};

    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
                + Duration::minutes(10 * i as i64),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 25 flat bars, a volume breakout at 25, then `tail` appended.
    fn breakout_series(tail: &[(f64, f64, f64, f64)]) -> Series {
        let mut bars: Vec<OhlcvBar> = (0..25)
            .map(|i| bar(i, 100.0, 100.5, 99.5, 100.0, 1000.0))
            .collect();
        bars.push(bar(25, 100.0, 102.5, 100.0, 102.0, 3000.0));
        for (k, &(o, h, l, c)) in tail.iter().enumerate() {
            bars.push(bar(26 + k, o, h, l, c, 1000.0));
        }
        Series::new("BTC/USDT", Duration::minutes(10), bars).unwrap()
    }

    fn config(execution: ExecutionPolicy) -> BacktestConfig {
        BacktestConfig {
            initial_capital: 10_000.0,
            execution,
            costs: ExecutionConfig::default(),
        }
    }

    fn risk() -> RiskManager {
        RiskManager::new(RiskConfig {
            max_position_fraction: 0.5,
            risk_reward_ratio: 2.0,
            lot_size: 0.01,
        })
    }

    fn volume_breakout() -> Strategy {
        Strategy::VolumeBreakout(VolumeBreakout::default())
    }

    #[test]
    fn current_close_fills_on_signal_bar() {
        let series = breakout_series(&[(102.0, 102.4, 101.8, 102.2)]);
        let result = run_backtest(
            &series,
            &volume_breakout(),
            &risk(),
            &config(ExecutionPolicy::CurrentClose),
        )
        .unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_price, 102.0);
        assert_eq!(trade.opened_at, series.bars()[25].timestamp);
        assert_eq!(trade.exit_reason, ExitReason::ForcedClose);
        assert_eq!(trade.exit_price, 102.2);
    }

    #[test]
    fn next_open_fills_on_following_bar() {
        let series = breakout_series(&[(102.1, 102.4, 101.8, 102.2)]);
        let result = run_backtest(
            &series,
            &volume_breakout(),
            &risk(),
            &config(ExecutionPolicy::NextOpen),
        )
        .unwrap();

        let trade = &result.trades[0];
        assert_eq!(trade.entry_price, 102.1);
        assert_eq!(trade.opened_at, series.bars()[26].timestamp);
        assert_eq!(trade.bars_held, 0);
    }

    #[test]
    fn pending_signal_on_last_bar_is_dropped() {
        let series = breakout_series(&[]);
        let result = run_backtest(
            &series,
            &volume_breakout(),
            &risk(),
            &config(ExecutionPolicy::NextOpen),
        )
        .unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.final_equity(), 10_000.0);
    }

    #[test]
    fn take_profit_exit_at_level() {
        // stop = 100.5 * 0.995 = 99.9975, distance 2.0025, target 106.005
        let series = breakout_series(&[(102.0, 107.0, 101.9, 106.5), (106.5, 107.0, 106.0, 106.8)]);
        let result = run_backtest(
            &series,
            &volume_breakout(),
            &risk(),
            &config(ExecutionPolicy::CurrentClose),
        )
        .unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert!((trade.exit_price - trade.take_profit).abs() < 1e-12);
        assert!(trade.realized_pnl > 0.0);
        assert!((result.final_equity() - (10_000.0 + trade.realized_pnl)).abs() < 1e-9);
    }

    #[test]
    fn equity_curve_has_one_point_per_bar() {
        let series = breakout_series(&[(102.0, 102.4, 101.8, 102.2); 3]);
        let result = run_backtest(
            &series,
            &volume_breakout(),
            &risk(),
            &config(ExecutionPolicy::CurrentClose),
        )
        .unwrap();
        assert_eq!(result.equity_curve.len(), series.len());
        // open position is marked but not realized
        let point = &result.equity_curve[26];
        assert!((point.equity - 10_000.0).abs() < 1e-9);
        assert!(point.marked_equity > point.equity);
    }

    #[test]
    fn gap_fails_the_run() {
        let mut bars: Vec<OhlcvBar> = (0..5)
            .map(|i| bar(i, 100.0, 100.5, 99.5, 100.0, 1000.0))
            .collect();
        bars.push(bar(7, 100.0, 100.5, 99.5, 100.0, 1000.0));
        let series = Series::new("ETH/USDT", Duration::minutes(10), bars).unwrap();
        let err = run_backtest(
            &series,
            &volume_breakout(),
            &risk(),
            &config(ExecutionPolicy::NextOpen),
        )
        .unwrap_err();
        assert!(matches!(err, SigtraderError::Sequence { index: 5, .. }));
    }

    #[test]
    fn zero_size_is_skipped_not_fatal() {
        let series = breakout_series(&[(102.0, 102.4, 101.8, 102.2)]);
        let cfg = BacktestConfig {
            initial_capital: 1.0,
            ..config(ExecutionPolicy::CurrentClose)
        };
        let result = run_backtest(&series, &volume_breakout(), &risk(), &cfg).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, SkipReason::ZeroSize);
    }

    #[test]
    fn next_open_gap_through_stop_is_invalid_distance() {
        // opens below the breakout stop: a long cannot be placed
        let series = breakout_series(&[(99.0, 99.5, 98.5, 99.2)]);
        let result = run_backtest(
            &series,
            &volume_breakout(),
            &risk(),
            &config(ExecutionPolicy::NextOpen),
        )
        .unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.skipped[0].reason, SkipReason::InvalidStopDistance);
    }

    #[test]
    fn run_many_preserves_order() {
        let a = breakout_series(&[(102.0, 102.4, 101.8, 102.2)]);
        let b = Series::new("ETH/USDT", Duration::minutes(10), a.bars().to_vec()).unwrap();
        let ema = Strategy::EmaCrossover(
            EmaCrossover::new(EmaCrossoverParams {
                fast_period: 2,
                slow_period: 4,
                ..EmaCrossoverParams::default()
            })
            .unwrap(),
        );
        let vb = volume_breakout();
        let jobs = [
            BacktestJob { series: &a, strategy: &vb },
            BacktestJob { series: &b, strategy: &ema },
            BacktestJob { series: &b, strategy: &vb },
        ];
        let results = run_many(&jobs, &risk(), &config(ExecutionPolicy::NextOpen));
        let keys: Vec<(String, StrategyId)> = results
            .into_iter()
            .map(|r| {
                let r = r.unwrap();
                (r.symbol, r.strategy_id)
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("BTC/USDT".to_string(), StrategyId::VolumeBreakout),
                ("ETH/USDT".to_string(), StrategyId::EmaCrossover),
                ("ETH/USDT".to_string(), StrategyId::VolumeBreakout),
            ]
        );
    }
}
