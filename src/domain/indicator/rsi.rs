//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n values are undefined (need n price changes).

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn rsi_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = values
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for change_idx in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[change_idx]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[change_idx]) / period as f64;
        out[change_idx + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rsi = 100.0 - (100.0 / (1.0 + avg_gain / avg_loss));
    rsi.clamp(0.0, 100.0)
}

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    IndicatorSeries::from_simple(IndicatorType::Rsi(period), bars, rsi_values(&closes, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::bars_from_closes;

    #[test]
    fn rsi_empty_and_single() {
        assert!(rsi_values(&[], 14).is_empty());
        assert_eq!(rsi_values(&[100.0], 14), vec![None]);
    }

    #[test]
    fn rsi_warmup_period() {
        let prices: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let out = rsi_values(&prices, 14);

        assert_eq!(out.len(), 15);
        for (i, v) in out.iter().enumerate().take(14) {
            assert!(v.is_none(), "index {} should be undefined", i);
        }
        assert!(out[14].is_some());
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let out = rsi_values(&prices, 14);
        assert!((out[14].unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let out = rsi_values(&prices, 14);
        assert!(out[14].unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_prices_read_as_100() {
        let out = rsi_values(&[50.0; 6], 3);
        assert_eq!(out[3], Some(100.0));
        assert_eq!(out[5], Some(100.0));
    }

    #[test]
    fn rsi_wilder_smoothing_step() {
        // changes: +1, -1, +2, -1 ; period 2
        let out = rsi_values(&[10.0, 11.0, 10.0, 12.0, 11.0], 2);
        let (mut g, mut l) = (0.5, 0.5);
        assert!((out[2].unwrap() - 50.0).abs() < 1e-12);
        g = (g * 1.0 + 2.0) / 2.0;
        l = (l * 1.0 + 0.0) / 2.0;
        let expected = 100.0 - 100.0 / (1.0 + g / l);
        assert!((out[3].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn rsi_in_range() {
        let prices: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        for v in rsi_values(&prices, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "RSI {} out of range", v);
        }
    }

    #[test]
    fn rsi_zero_period() {
        assert_eq!(rsi_values(&[100.0, 101.0], 0), vec![None, None]);
    }

    #[test]
    fn rsi_indicator_type() {
        let series = calculate_rsi(&bars_from_closes(&[100.0]), 14);
        assert_eq!(series.indicator_type, IndicatorType::Rsi(14));
    }
}
