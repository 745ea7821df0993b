//! Bollinger squeeze breakout confirmed by the MACD histogram.

use super::{require_period, require_positive, signal_at, simple_at, SignalRule};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::{IndicatorMap, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{Direction, Rationale, Signal, StrategyId};
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "bollinger_squeeze";
const MAX_BB_STD: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSqueezeParams {
    pub bb_period: usize,
    pub bb_std: f64,
    /// Band width (upper - lower) / middle below which the market is squeezed.
    pub width_threshold: f64,
    /// Consecutive squeezed bars required before the breakout bar.
    pub squeeze_bars: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub stop_atr_multiplier: f64,
    pub volume_period: usize,
}

impl Default for BollingerSqueezeParams {
    fn default() -> Self {
        BollingerSqueezeParams {
            bb_period: 20,
            bb_std: 2.0,
            width_threshold: 0.04,
            squeeze_bars: 5,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            stop_atr_multiplier: 1.3,
            volume_period: 10,
        }
    }
}

impl BollingerSqueezeParams {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let d = Self::default();
        Ok(BollingerSqueezeParams {
            bb_period: config.get_usize(SECTION, "bb_period", d.bb_period)?,
            bb_std: config.get_f64(SECTION, "bb_std", d.bb_std)?,
            width_threshold: config.get_f64(SECTION, "width_threshold", d.width_threshold)?,
            squeeze_bars: config.get_usize(SECTION, "squeeze_bars", d.squeeze_bars)?,
            macd_fast: config.get_usize(SECTION, "macd_fast", d.macd_fast)?,
            macd_slow: config.get_usize(SECTION, "macd_slow", d.macd_slow)?,
            macd_signal: config.get_usize(SECTION, "macd_signal", d.macd_signal)?,
            atr_period: config.get_usize(SECTION, "atr_period", d.atr_period)?,
            stop_atr_multiplier: config.get_f64(
                SECTION,
                "stop_atr_multiplier",
                d.stop_atr_multiplier,
            )?,
            volume_period: config.get_usize(SECTION, "volume_period", d.volume_period)?,
        })
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        require_period(SECTION, "bb_period", self.bb_period)?;
        require_positive(SECTION, "bb_std", self.bb_std)?;
        if self.bb_std > MAX_BB_STD {
            return Err(SigtraderError::invalid(
                SECTION,
                "bb_std",
                format!("bb_std must be at most {}", MAX_BB_STD),
            ));
        }
        let hundredths = self.bb_std * 100.0;
        if (hundredths - hundredths.round()).abs() > 1e-6 {
            return Err(SigtraderError::invalid(
                SECTION,
                "bb_std",
                "bb_std must have at most two decimal places",
            ));
        }
        require_positive(SECTION, "width_threshold", self.width_threshold)?;
        require_period(SECTION, "squeeze_bars", self.squeeze_bars)?;
        require_period(SECTION, "macd_fast", self.macd_fast)?;
        require_period(SECTION, "macd_slow", self.macd_slow)?;
        require_period(SECTION, "macd_signal", self.macd_signal)?;
        require_period(SECTION, "atr_period", self.atr_period)?;
        require_positive(SECTION, "stop_atr_multiplier", self.stop_atr_multiplier)?;
        require_period(SECTION, "volume_period", self.volume_period)?;
        if self.macd_fast >= self.macd_slow {
            return Err(SigtraderError::invalid(
                SECTION,
                "macd_fast",
                "macd_fast must be less than macd_slow",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BollingerSqueeze {
    params: BollingerSqueezeParams,
}

impl BollingerSqueeze {
    pub fn new(params: BollingerSqueezeParams) -> Result<Self, SigtraderError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &BollingerSqueezeParams {
        &self.params
    }

    fn bands_key(&self) -> IndicatorType {
        IndicatorType::bollinger(self.params.bb_period, self.params.bb_std)
    }

    fn macd_key(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.params.macd_fast,
            slow: self.params.macd_slow,
            signal: self.params.macd_signal,
        }
    }

    /// Every one of the `squeeze_bars` bars before `index` had narrow bands.
    fn squeezed_before(&self, indicators: &IndicatorMap, index: usize) -> Option<bool> {
        let start = index.checked_sub(self.params.squeeze_bars)?;
        let bands = indicators.get(&self.bands_key())?;
        for j in start..index {
            if bands.bands(j)?.width() >= self.params.width_threshold {
                return Some(false);
            }
        }
        Some(true)
    }
}

impl SignalRule for BollingerSqueeze {
    fn id(&self) -> StrategyId {
        StrategyId::BollingerSqueeze
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            self.bands_key(),
            self.macd_key(),
            IndicatorType::Atr(self.params.atr_period),
            IndicatorType::VolumeSma(self.params.volume_period),
        ]
    }

    fn warmup_bars(&self) -> usize {
        let p = &self.params;
        (p.bb_period + p.squeeze_bars)
            .max(p.macd_slow + p.macd_signal - 1)
            .max(p.atr_period)
            .max(p.volume_period)
    }

    fn evaluate(
        &self,
        bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
    ) -> Option<Signal> {
        let bar = bars.get(index)?;
        if !self.squeezed_before(indicators, index)? {
            return None;
        }
        let bands = indicators.get(&self.bands_key())?.bands(index)?;
        let histogram = indicators.get(&self.macd_key())?.macd(index)?.histogram;

        let direction = if bar.close > bands.upper && histogram > 0.0 {
            Direction::Long
        } else if bar.close < bands.lower && histogram < 0.0 {
            Direction::Short
        } else {
            return None;
        };

        let avg_volume = simple_at(
            indicators,
            &IndicatorType::VolumeSma(self.params.volume_period),
            index,
        )?;
        let confidence = if bar.volume > avg_volume { 0.8 } else { 0.6 };
        let rationale = Rationale::new(confidence)
            .with("band_width", bands.width())
            .with("macd_histogram", histogram)
            .with("upper_band", bands.upper)
            .with("lower_band", bands.lower);
        signal_at(self, bars, indicators, index, direction, rationale)
    }

    fn stop_loss_at(
        &self,
        _bars: &[OhlcvBar],
        indicators: &IndicatorMap,
        index: usize,
        direction: Direction,
        entry_price: f64,
    ) -> Option<f64> {
        let atr = simple_at(indicators, &IndicatorType::Atr(self.params.atr_period), index)?;
        Some(entry_price - direction.multiplier() * self.params.stop_atr_multiplier * atr)
    }
}
