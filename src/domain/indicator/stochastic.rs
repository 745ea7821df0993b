//! Stochastic oscillator.
//!
//! %K = 100 * (C - LL(k)) / (HH(k) - LL(k)), 50 when the range is flat.
//! %D = SMA(d) of %K.

use crate::domain::indicator::extrema::{highest_values, lowest_values};
use crate::domain::indicator::{sma_values, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stochastic(
    bars: &[OhlcvBar],
    k_period: usize,
    d_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let hh = highest_values(&highs, k_period);
    let ll = lowest_values(&lows, k_period);

    let k: Vec<Option<f64>> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let (high, low) = (hh[i]?, ll[i]?);
            let range = high - low;
            if range == 0.0 {
                Some(50.0)
            } else {
                Some(100.0 * (bar.close - low) / range)
            }
        })
        .collect();

    let mut values = vec![None; bars.len()];
    if d_period > 0 && k_period > 0 {
        let first_k = k_period - 1;
        if bars.len() > first_k {
            let defined_k: Vec<f64> = k[first_k..].iter().flatten().copied().collect();
            for (offset, d) in sma_values(&defined_k, d_period).into_iter().enumerate() {
                let i = first_k + offset;
                if let (Some(k_value), Some(d_value)) = (k[i], d) {
                    values[i] = Some(IndicatorValue::Stochastic {
                        k: k_value,
                        d: d_value,
                    });
                }
            }
        }
    }
    IndicatorSeries::from_values(indicator_type, bars, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::bars_from_closes;

    fn stoch_at(series: &IndicatorSeries, i: usize) -> Option<(f64, f64)> {
        match series.get(i)? {
            IndicatorValue::Stochastic { k, d } => Some((k, d)),
            _ => None,
        }
    }

    #[test]
    fn stochastic_warmup() {
        let bars = bars_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let series = calculate_stochastic(&bars, 3, 2);
        assert!(stoch_at(&series, 2).is_none());
        assert!(stoch_at(&series, 3).is_some());
    }

    #[test]
    fn close_at_top_of_range_reads_100() {
        let bars = bars_from_closes(&[1.0, 2.0, 3.0, 4.0]);
        let (k, d) = stoch_at(&calculate_stochastic(&bars, 3, 2), 3).unwrap();
        assert!((k - 100.0).abs() < 1e-12);
        assert!((d - 100.0).abs() < 1e-12);
    }

    #[test]
    fn flat_range_reads_50() {
        let bars = bars_from_closes(&[7.0; 4]);
        let (k, _) = stoch_at(&calculate_stochastic(&bars, 2, 1), 3).unwrap();
        assert_eq!(k, 50.0);
    }
}
