//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) bars are undefined.

use crate::domain::indicator::stddev::window_stddev;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bands {
    /// Relative band width: (upper - lower) / middle.
    pub fn width(&self) -> f64 {
        (self.upper - self.lower) / self.middle
    }
}

pub fn bollinger_values(values: &[f64], period: usize, num_std: f64) -> Vec<Option<Bands>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..values.len() {
        let (middle, sd) = window_stddev(&values[i + 1 - period..=i]);
        out[i] = Some(Bands {
            upper: middle + num_std * sd,
            middle,
            lower: middle - num_std * sd,
        });
    }
    out
}

pub fn calculate_bollinger(bars: &[OhlcvBar], period: usize, num_std: f64) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = bollinger_values(&closes, period, num_std)
        .into_iter()
        .map(|b| b.map(IndicatorValue::Bollinger))
        .collect();
    IndicatorSeries::from_values(IndicatorType::bollinger(period, num_std), bars, values)
}
