//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low; TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! Seed at index (period-1) with the mean of the first `period` true ranges,
//! then ATR[i] = (ATR[i-1] * (period-1) + TR[i]) / period.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn atr_values(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let tr_values: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut atr = tr_values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(atr);
    for i in period..bars.len() {
        atr = (atr * (period - 1) as f64 + tr_values[i]) / period as f64;
        out[i] = Some(atr);
    }
    out
}

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    IndicatorSeries::from_simple(IndicatorType::Atr(period), bars, atr_values(bars, period))
}
