//! RSI divergence at oversold/overbought extremes.
//!
//! Bullish: the close undercuts the lowest close of the prior window while
//! RSI sits above its reading at that low, and RSI is oversold. Bearish is the
//! mirror image with highs and overbought RSI. The prior window is the
//! `lookback` bars ending `lookback` bars before the current one.

use super::{
    buffered_stop, require_buffer, require_period, signal_at, simple_at, SignalRule,
};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::{IndicatorMap, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::risk::RiskConfig;
use crate::domain::signal::{Direction, Rationale, Signal, StrategyId};
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "rsi_divergence";
const RISK_REWARD_RATIO: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RsiDivergenceParams {
    pub rsi_period: usize,
    pub lookback: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub stop_window: usize,
    pub stop_buffer_pct: f64,
}

impl Default for RsiDivergenceParams {
    fn default() -> Self {
        RsiDivergenceParams {
            rsi_period: 14,
            lookback: 10,
            oversold: 30.0,
            overbought: 70.0,
            stop_window: 10,
            stop_buffer_pct: 2.0,
        }
    }
}

impl RsiDivergenceParams {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let d = Self::default();
        Ok(RsiDivergenceParams {
            rsi_period: config.get_usize(SECTION, "rsi_period", d.rsi_period)?,
            lookback: config.get_usize(SECTION, "lookback", d.lookback)?,
            oversold: config.get_f64(SECTION, "oversold", d.oversold)?,
            overbought: config.get_f64(SECTION, "overbought", d.overbought)?,
            stop_window: config.get_usize(SECTION, "stop_window", d.stop_window)?,
            stop_buffer_pct: config.get_f64(SECTION, "stop_buffer_pct", d.stop_buffer_pct)?,
        })
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        require_period(SECTION, "rsi_period", self.rsi_period)?;
        require_period(SECTION, "lookback", self.lookback)?;
        require_period(SECTION, "stop_window", self.stop_window)?;
        require_buffer(SECTION, "stop_buffer_pct", self.stop_buffer_pct)?;
        if !(0.0 < self.oversold && self.oversold < self.overbought && self.overbought < 100.0) {
            return Err(SigtraderError::invalid(
                SECTION,
                "oversold",
                "expected 0 < oversold < overbought < 100",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RsiDivergence {
    params: RsiDivergenceParams,
}

impl RsiDivergence {
    pub fn new(params: RsiDivergenceParams) -> Result<Self, SigtraderError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &RsiDivergenceParams {
        &self.params
    }

    /// Index range of the prior comparison window for bar `index`.
    fn prior_window(&self, index: usize) -> Option<std::ops::RangeInclusive<usize>> {
        let end = index.checked_sub(self.params.lookback)?;
        let start = (end + 1).checked_sub(self.params.lookback)?;
        Some(start..=end)
    }
}

impl SignalRule for RsiDivergence {
    fn id(&self) -> StrategyId {
        StrategyId::RsiDivergence
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Rsi(self.params.rsi_period),
            IndicatorType::LowestLow(self.params.stop_window),
            IndicatorType::HighestHigh(self.params.stop_window),
        ]
    }

    fn warmup_bars(&self) -> usize {
        (self.params.rsi_period + 2 * self.params.lookback).max(self.params.stop_window)
    }

    fn evaluate(
        &self,
        bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
    ) -> Option<Signal> {
        let rsi_key = IndicatorType::Rsi(self.params.rsi_period);
        let close = bars.get(index)?.close;
        let rsi = simple_at(indicators, &rsi_key, index)?;
        let window = self.prior_window(index)?;

        let (direction, pivot) = if rsi < self.params.oversold {
            // first occurrence of the lowest close
            let pivot = window
                .clone()
                .reduce(|best, j| if bars[j].close < bars[best].close { j } else { best })?;
            let pivot_rsi = simple_at(indicators, &rsi_key, pivot)?;
            if !(close < bars[pivot].close && rsi > pivot_rsi) {
                return None;
            }
            (Direction::Long, pivot)
        } else if rsi > self.params.overbought {
            let pivot = window
                .clone()
                .reduce(|best, j| if bars[j].close > bars[best].close { j } else { best })?;
            let pivot_rsi = simple_at(indicators, &rsi_key, pivot)?;
            if !(close > bars[pivot].close && rsi < pivot_rsi) {
                return None;
            }
            (Direction::Short, pivot)
        } else {
            return None;
        };

        let pivot_rsi = simple_at(indicators, &rsi_key, pivot)?;
        let rationale = Rationale::new(0.7)
            .with("rsi", rsi)
            .with("pivot_close", bars[pivot].close)
            .with("pivot_rsi", pivot_rsi);
        signal_at(self, bars, indicators, index, direction, rationale)
    }

    fn stop_loss_at(
        &self,
        _bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
        direction: Direction,
        _entry_price: f64,
    ) -> Option<f64> {
        let key = match direction {
            Direction::Long => IndicatorType::LowestLow(self.params.stop_window),
            Direction::Short => IndicatorType::HighestHigh(self.params.stop_window),
        };
        let level = simple_at(indicators, &key, index)?;
        Some(buffered_stop(level, direction, self.params.stop_buffer_pct))
    }

    fn risk_reward_ratio(&self, _risk: &RiskConfig) -> f64 {
        RISK_REWARD_RATIO
    }
}
