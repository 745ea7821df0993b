#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use sigtrader::domain::backtest::BacktestConfig;
use sigtrader::domain::error::SigtraderError;
use sigtrader::domain::execution::{ExecutionConfig, ExecutionPolicy};
pub use sigtrader::domain::ohlcv::OhlcvBar;
use sigtrader::domain::series::Series;
use sigtrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub const TIMEFRAME_MINUTES: i64 = 10;

pub fn timeframe() -> Duration {
    Duration::minutes(TIMEFRAME_MINUTES)
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn ts(i: usize) -> DateTime<Utc> {
    start() + Duration::minutes(TIMEFRAME_MINUTES * i as i64)
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(&self, symbol: &str, timeframe: Duration) -> Result<Series, SigtraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SigtraderError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) => Series::new(symbol, timeframe, bars.clone()),
            None => Err(SigtraderError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, SigtraderError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let first = bars.iter().map(|b| b.timestamp).min().unwrap();
                let last = bars.iter().map(|b| b.timestamp).max().unwrap();
                Ok(Some((first, last, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: ts(i),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// 49 quiet bars at 100 followed by one breakout bar.
///
/// The breakout closes 1% above the prior 20-bar high (100.5) on volume equal
/// to three times the 20-bar average that includes it.
pub fn breakout_bars() -> Vec<OhlcvBar> {
    let mut bars: Vec<OhlcvBar> = (0..49)
        .map(|i| make_bar(i, 100.0, 100.5, 99.5, 100.0, 1000.0))
        .collect();
    bars.push(make_bar(49, 100.5, 102.0, 100.0, BREAKOUT_CLOSE, BREAKOUT_VOLUME));
    bars
}

pub const BREAKOUT_CLOSE: f64 = 101.505;
pub const BREAKOUT_VOLUME: f64 = 57_000.0 / 17.0;
pub const BREAKOUT_LEVEL: f64 = 100.5;

pub fn series(symbol: &str, bars: Vec<OhlcvBar>) -> Series {
    Series::new(symbol, timeframe(), bars).unwrap()
}

/// Deterministic wandering price path with periodic volume bursts.
pub fn synthetic_bars(n: usize) -> Vec<OhlcvBar> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut close = 100.0_f64;
    (0..n)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let noise = (state % 1000) as f64 / 1000.0 - 0.5;
            let drift = (i as f64 / 15.0).sin() * 0.8;
            let open = close;
            close = (close + drift + noise * 2.0).max(1.0);
            let high = open.max(close) + 0.3 + noise.abs();
            let low = (open.min(close) - 0.3 - noise.abs()).max(0.5);
            let volume = if i % 23 == 0 { 5000.0 } else { 1000.0 + 400.0 * noise };
            make_bar(i, open, high, low, close, volume)
        })
        .collect()
}

pub fn backtest_config(execution: ExecutionPolicy) -> BacktestConfig {
    BacktestConfig {
        initial_capital: 10_000.0,
        execution,
        costs: ExecutionConfig::default(),
    }
}
