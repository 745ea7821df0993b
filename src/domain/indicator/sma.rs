//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(V[i-n+1..=i]). Warmup: first (n-1) values are undefined.
//! Also used over volumes for breakout confirmation.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn sma_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        out[i] = Some(window.iter().sum::<f64>() / period as f64);
    }
    out
}

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    IndicatorSeries::from_simple(IndicatorType::Sma(period), bars, sma_values(&closes, period))
}

/// Average volume over `period` bars, including the current one.
pub fn calculate_volume_average(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    IndicatorSeries::from_simple(
        IndicatorType::VolumeSma(period),
        bars,
        sma_values(&volumes, period),
    )
}
