//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! The line is defined from index max(fast, slow) - 1; the signal line seeds
//! over the first `signal` defined line values. A point is emitted only once
//! all three components are defined.

use crate::domain::indicator::{ema_values, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn macd_values(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<Option<MacdPoint>> {
    let mut out = vec![None; values.len()];
    if fast == 0 || slow == 0 || signal_period == 0 {
        return out;
    }
    let line_start = fast.max(slow) - 1;
    if values.len() <= line_start {
        return out;
    }

    let ema_fast = ema_values(values, fast);
    let ema_slow = ema_values(values, slow);
    let line: Vec<f64> = ema_fast[line_start..]
        .iter()
        .zip(&ema_slow[line_start..])
        .filter_map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema_values(&line, signal_period);

    for (offset, (line_value, signal_value)) in line.iter().zip(signal).enumerate() {
        if let Some(signal_value) = signal_value {
            out[line_start + offset] = Some(MacdPoint {
                line: *line_value,
                signal: signal_value,
                histogram: line_value - signal_value,
            });
        }
    }
    out
}

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = macd_values(&closes, fast, slow, signal_period)
        .into_iter()
        .map(|p| p.map(IndicatorValue::Macd))
        .collect();
    IndicatorSeries::from_values(
        IndicatorType::Macd {
            fast,
            slow,
            signal: signal_period,
        },
        bars,
        values,
    )
}
