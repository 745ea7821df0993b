//! Technical indicator implementations.
//!
//! Every indicator comes in two shapes:
//! - a projection form over `&[f64]` returning `Vec<Option<f64>>` of the same length,
//! - a bar form over `&[OhlcvBar]` returning an [`IndicatorSeries`].
//!
//! Warm-up positions are `None`. They are never substituted with zero.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod extrema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, Bands};
pub use ema::{calculate_ema, ema_values};
pub use extrema::{calculate_highest_high, calculate_lowest_low};
pub use macd::{calculate_macd, MacdPoint};
pub use rsi::{calculate_rsi, rsi_values};
pub use sma::{calculate_sma, calculate_volume_average, sma_values};
pub use stddev::{calculate_stddev, stddev_values};
pub use stochastic::calculate_stochastic;

use crate::domain::ohlcv::OhlcvBar;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<IndicatorValue>,
}

impl IndicatorPoint {
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd(MacdPoint),
    Bollinger(Bands),
    Stochastic { k: f64, d: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Stddev(usize),
    VolumeSma(usize),
    HighestHigh(usize),
    LowestLow(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
}

impl IndicatorType {
    /// Bollinger key for a float multiplier, stored as hundredths so the type stays hashable.
    /// Strategy config rejects multipliers finer than 0.01 or above 10.
    pub fn bollinger(period: usize, num_std: f64) -> Self {
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100: (num_std * 100.0).round() as u32,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
            IndicatorType::HighestHigh(period) => write!(f, "HIGHEST_HIGH({})", period),
            IndicatorType::LowestLow(period) => write!(f, "LOWEST_LOW({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Zips aligned values with the bar timestamps.
    pub fn from_values(
        indicator_type: IndicatorType,
        bars: &[OhlcvBar],
        values: Vec<Option<IndicatorValue>>,
    ) -> Self {
        debug_assert_eq!(bars.len(), values.len());
        let values = bars
            .iter()
            .zip(values)
            .map(|(bar, value)| IndicatorPoint {
                timestamp: bar.timestamp,
                value,
            })
            .collect();
        Self {
            indicator_type,
            values,
        }
    }

    pub(crate) fn from_simple(
        indicator_type: IndicatorType,
        bars: &[OhlcvBar],
        values: Vec<Option<f64>>,
    ) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.map(IndicatorValue::Simple))
            .collect();
        Self::from_values(indicator_type, bars, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<IndicatorValue> {
        self.values.get(index).and_then(|p| p.value)
    }

    pub fn simple(&self, index: usize) -> Option<f64> {
        match self.get(index)? {
            IndicatorValue::Simple(v) => Some(v),
            _ => None,
        }
    }

    pub fn macd(&self, index: usize) -> Option<MacdPoint> {
        match self.get(index)? {
            IndicatorValue::Macd(p) => Some(p),
            _ => None,
        }
    }

    pub fn bands(&self, index: usize) -> Option<Bands> {
        match self.get(index)? {
            IndicatorValue::Bollinger(b) => Some(b),
            _ => None,
        }
    }
}

/// Indicator series keyed by identity, computed once per series.
pub type IndicatorMap = HashMap<IndicatorType, IndicatorSeries>;

pub fn compute_indicator(bars: &[OhlcvBar], indicator_type: &IndicatorType) -> IndicatorSeries {
    match *indicator_type {
        IndicatorType::Sma(period) => calculate_sma(bars, period),
        IndicatorType::Ema(period) => calculate_ema(bars, period),
        IndicatorType::Rsi(period) => calculate_rsi(bars, period),
        IndicatorType::Atr(period) => calculate_atr(bars, period),
        IndicatorType::Stddev(period) => calculate_stddev(bars, period),
        IndicatorType::VolumeSma(period) => calculate_volume_average(bars, period),
        IndicatorType::HighestHigh(period) => calculate_highest_high(bars, period),
        IndicatorType::LowestLow(period) => calculate_lowest_low(bars, period),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(bars, period, stddev_mult_x100 as f64 / 100.0),
        IndicatorType::Stochastic { k_period, d_period } => {
            calculate_stochastic(bars, k_period, d_period)
        }
    }
}

pub fn compute_indicators(bars: &[OhlcvBar], types: &[IndicatorType]) -> IndicatorMap {
    let mut map = IndicatorMap::new();
    for indicator_type in types {
        if !map.contains_key(indicator_type) {
            map.insert(
                indicator_type.clone(),
                compute_indicator(bars, indicator_type),
            );
        }
    }
    map
}

#[cfg(test)]
pub(crate) fn bars_from_closes(prices: &[f64]) -> Vec<OhlcvBar> {
    use chrono::{Duration, TimeZone};
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: start + Duration::minutes(10 * i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}
