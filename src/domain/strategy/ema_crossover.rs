//! Fast/slow EMA crossover with a volume filter.

use super::{
    buffered_stop, require_buffer, require_period, require_positive, signal_at, simple_at,
    SignalRule,
};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::{IndicatorMap, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::risk::RiskConfig;
use crate::domain::signal::{Direction, Rationale, Signal, StrategyId};
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "ema_crossover";

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub volume_period: usize,
    pub volume_multiplier: f64,
    pub stop_window: usize,
    pub stop_buffer_pct: f64,
    /// Overrides the risk config ratio when set.
    pub risk_reward_ratio: Option<f64>,
}

impl Default for EmaCrossoverParams {
    fn default() -> Self {
        EmaCrossoverParams {
            fast_period: 5,
            slow_period: 20,
            volume_period: 10,
            volume_multiplier: 1.0,
            stop_window: 10,
            stop_buffer_pct: 0.5,
            risk_reward_ratio: Some(2.5),
        }
    }
}

impl EmaCrossoverParams {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let d = Self::default();
        let risk_reward_ratio = match config.get_string(SECTION, "risk_reward_ratio") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("none") => None,
            Some(_) => Some(config.get_f64(SECTION, "risk_reward_ratio", 0.0)?),
            None => d.risk_reward_ratio,
        };
        Ok(EmaCrossoverParams {
            fast_period: config.get_usize(SECTION, "fast_period", d.fast_period)?,
            slow_period: config.get_usize(SECTION, "slow_period", d.slow_period)?,
            volume_period: config.get_usize(SECTION, "volume_period", d.volume_period)?,
            volume_multiplier: config.get_f64(SECTION, "volume_multiplier", d.volume_multiplier)?,
            stop_window: config.get_usize(SECTION, "stop_window", d.stop_window)?,
            stop_buffer_pct: config.get_f64(SECTION, "stop_buffer_pct", d.stop_buffer_pct)?,
            risk_reward_ratio,
        })
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        require_period(SECTION, "fast_period", self.fast_period)?;
        require_period(SECTION, "slow_period", self.slow_period)?;
        require_period(SECTION, "volume_period", self.volume_period)?;
        require_positive(SECTION, "volume_multiplier", self.volume_multiplier)?;
        require_period(SECTION, "stop_window", self.stop_window)?;
        require_buffer(SECTION, "stop_buffer_pct", self.stop_buffer_pct)?;
        if let Some(ratio) = self.risk_reward_ratio {
            require_positive(SECTION, "risk_reward_ratio", ratio)?;
        }
        if self.fast_period >= self.slow_period {
            return Err(SigtraderError::invalid(
                SECTION,
                "fast_period",
                "fast_period must be less than slow_period",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmaCrossover {
    params: EmaCrossoverParams,
}

impl EmaCrossover {
    pub fn new(params: EmaCrossoverParams) -> Result<Self, SigtraderError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &EmaCrossoverParams {
        &self.params
    }

    fn spread(&self, indicators: &IndicatorMap, index: usize) -> Option<(f64, f64)> {
        let fast = simple_at(indicators, &IndicatorType::Ema(self.params.fast_period), index)?;
        let slow = simple_at(indicators, &IndicatorType::Ema(self.params.slow_period), index)?;
        Some((fast, slow))
    }
}

impl SignalRule for EmaCrossover {
    fn id(&self) -> StrategyId {
        StrategyId::EmaCrossover
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Ema(self.params.fast_period),
            IndicatorType::Ema(self.params.slow_period),
            IndicatorType::VolumeSma(self.params.volume_period),
            IndicatorType::LowestLow(self.params.stop_window),
            IndicatorType::HighestHigh(self.params.stop_window),
        ]
    }

    fn warmup_bars(&self) -> usize {
        (self.params.slow_period + 1)
            .max(self.params.volume_period)
            .max(self.params.stop_window)
    }

    fn evaluate(
        &self,
        bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
    ) -> Option<Signal> {
        let bar = bars.get(index)?;
        let (prev_fast, prev_slow) = self.spread(indicators, index.checked_sub(1)?)?;
        let (fast, slow) = self.spread(indicators, index)?;
        let avg_volume = simple_at(
            indicators,
            &IndicatorType::VolumeSma(self.params.volume_period),
            index,
        )?;
        if bar.volume < self.params.volume_multiplier * avg_volume {
            return None;
        }

        let prev_diff = prev_fast - prev_slow;
        let diff = fast - slow;
        let (direction, confidence) = if prev_diff <= 0.0 && diff > 0.0 {
            (Direction::Long, if fast > slow * 1.01 { 0.7 } else { 0.5 })
        } else if prev_diff >= 0.0 && diff < 0.0 {
            (Direction::Short, if fast < slow * 0.99 { 0.7 } else { 0.5 })
        } else {
            return None;
        };

        let rationale = Rationale::new(confidence)
            .with("ema_fast", fast)
            .with("ema_slow", slow)
            .with("volume_ratio", if avg_volume > 0.0 { bar.volume / avg_volume } else { 0.0 });
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

    fn risk_reward_ratio(&self, risk: &RiskConfig) -> f64 {
        self.params
            .risk_reward_ratio
            .unwrap_or(risk.risk_reward_ratio)
    }
}
