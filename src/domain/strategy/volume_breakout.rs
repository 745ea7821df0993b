//! Breakout of the recent high/low range confirmed by a volume spike.

use super::{
    buffered_stop, require_buffer, require_period, require_positive, signal_at, simple_at,
    SignalRule,
};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::{IndicatorMap, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{Direction, Rationale, Signal, StrategyId};
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "volume_breakout";

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeBreakoutParams {
    /// Bars before the current one that define resistance and support.
    pub lookback: usize,
    pub volume_period: usize,
    pub volume_multiplier: f64,
    /// Stop distance beyond the broken level, in percent.
    pub stop_buffer_pct: f64,
}

impl Default for VolumeBreakoutParams {
    fn default() -> Self {
        VolumeBreakoutParams {
            lookback: 20,
            volume_period: 20,
            volume_multiplier: 2.0,
            stop_buffer_pct: 0.5,
        }
    }
}

impl VolumeBreakoutParams {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let d = Self::default();
        Ok(VolumeBreakoutParams {
            lookback: config.get_usize(SECTION, "lookback", d.lookback)?,
            volume_period: config.get_usize(SECTION, "volume_period", d.volume_period)?,
            volume_multiplier: config.get_f64(SECTION, "volume_multiplier", d.volume_multiplier)?,
            stop_buffer_pct: config.get_f64(SECTION, "stop_buffer_pct", d.stop_buffer_pct)?,
        })
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        require_period(SECTION, "lookback", self.lookback)?;
        require_period(SECTION, "volume_period", self.volume_period)?;
        require_positive(SECTION, "volume_multiplier", self.volume_multiplier)?;
        require_buffer(SECTION, "stop_buffer_pct", self.stop_buffer_pct)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumeBreakout {
    params: VolumeBreakoutParams,
}

impl VolumeBreakout {
    pub fn new(params: VolumeBreakoutParams) -> Result<Self, SigtraderError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &VolumeBreakoutParams {
        &self.params
    }

    fn resistance(&self, indicators: &IndicatorMap, index: usize) -> Option<f64> {
        let prev = index.checked_sub(1)?;
        simple_at(indicators, &IndicatorType::HighestHigh(self.params.lookback), prev)
    }

    fn support(&self, indicators: &IndicatorMap, index: usize) -> Option<f64> {
        let prev = index.checked_sub(1)?;
        simple_at(indicators, &IndicatorType::LowestLow(self.params.lookback), prev)
    }
}

impl SignalRule for VolumeBreakout {
    fn id(&self) -> StrategyId {
        StrategyId::VolumeBreakout
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::HighestHigh(self.params.lookback),
            IndicatorType::LowestLow(self.params.lookback),
            IndicatorType::VolumeSma(self.params.volume_period),
        ]
    }

    fn warmup_bars(&self) -> usize {
        (self.params.lookback + 1).max(self.params.volume_period)
    }

    fn evaluate(
        &self,
        bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
    ) -> Option<Signal> {
        let bar = bars.get(index)?;
        let resistance = self.resistance(indicators, index)?;
        let support = self.support(indicators, index)?;
        let avg_volume = simple_at(
            indicators,
            &IndicatorType::VolumeSma(self.params.volume_period),
            index,
        )?;
        if avg_volume <= 0.0 {
            return None;
        }

        let volume_ratio = bar.volume / avg_volume;
        if volume_ratio < self.params.volume_multiplier {
            return None;
        }

        let (direction, level) = if bar.close > resistance {
            (Direction::Long, resistance)
        } else if bar.close < support {
            (Direction::Short, support)
        } else {
            return None;
        };

        let confidence = (0.5 + (volume_ratio - 2.0) * 0.1).clamp(0.0, 0.9);
        let rationale = Rationale::new(confidence)
            .with("breakout_level", level)
            .with("breakout_pct", (bar.close - level) / level * 100.0)
            .with("volume_ratio", volume_ratio);
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
        let level = match direction {
            Direction::Long => self.resistance(indicators, index)?,
            Direction::Short => self.support(indicators, index)?,
        };
        Some(buffered_stop(level, direction, self.params.stop_buffer_pct))
    }
}
