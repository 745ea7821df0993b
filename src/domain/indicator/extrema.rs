//! Rolling highest high and lowest low, including the current bar.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

fn rolling(values: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..values.len() {
        out[i] = values[i + 1 - period..=i].iter().copied().reduce(pick);
    }
    out
}

pub fn highest_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, f64::max)
}

pub fn lowest_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, f64::min)
}

pub fn calculate_highest_high(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    IndicatorSeries::from_simple(
        IndicatorType::HighestHigh(period),
        bars,
        highest_values(&highs, period),
    )
}

pub fn calculate_lowest_low(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    IndicatorSeries::from_simple(
        IndicatorType::LowestLow(period),
        bars,
        lowest_values(&lows, period),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::bars_from_closes;

    #[test]
    fn rolling_extrema_include_current() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(
            highest_values(&values, 3),
            vec![None, None, Some(4.0), Some(4.0), Some(5.0)]
        );
        assert_eq!(
            lowest_values(&values, 3),
            vec![None, None, Some(1.0), Some(1.0), Some(1.0)]
        );
    }

    #[test]
    fn bar_forms_read_high_and_low() {
        let mut bars = bars_from_closes(&[10.0, 10.0]);
        bars[0].high = 12.0;
        bars[1].low = 8.0;
        assert_eq!(calculate_highest_high(&bars, 2).simple(1), Some(12.0));
        assert_eq!(calculate_lowest_low(&bars, 2).simple(1), Some(8.0));
    }

    #[test]
    fn zero_period_is_undefined() {
        assert_eq!(highest_values(&[1.0, 2.0], 0), vec![None, None]);
    }
}
