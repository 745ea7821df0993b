//! Symbol universe for multi-pair backtesting.
//!
//! Parses symbol lists from configuration and loads each symbol's series,
//! skipping those without enough history.

use crate::domain::error::SigtraderError;
use crate::domain::series::Series;
use crate::ports::data_port::DataPort;
use chrono::Duration;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Universe {
    pub series: Vec<Series>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.series.len()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.symbol.as_str()).collect()
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug)]
pub struct UniverseValidationResult {
    pub universe: Universe,
    pub skipped: Vec<SkippedSymbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

/// Loads each symbol, keeping those with at least `minimum_bars` bars.
///
/// Malformed data is fatal; missing or short history only skips the symbol.
/// Fails with `InsufficientData` when nothing usable remains.
pub fn validate_universe(
    data_port: &dyn DataPort,
    symbols: Vec<String>,
    timeframe: Duration,
    minimum_bars: usize,
) -> Result<UniverseValidationResult, SigtraderError> {
    let total = symbols.len();
    let mut series_list = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        let series = match data_port.fetch_series(&symbol, timeframe) {
            Ok(series) => series,
            Err(SigtraderError::NoData { .. }) => {
                warn!(%symbol, "skipping: no data found");
                skipped.push(SkippedSymbol {
                    symbol,
                    reason: SkipReason::NoData,
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        if series.is_empty() {
            warn!(%symbol, "skipping: no data found");
            skipped.push(SkippedSymbol {
                symbol,
                reason: SkipReason::NoData,
            });
            continue;
        }

        if series.len() < minimum_bars {
            warn!(
                %symbol,
                bars = series.len(),
                minimum = minimum_bars,
                "skipping: insufficient history"
            );
            skipped.push(SkippedSymbol {
                symbol,
                reason: SkipReason::InsufficientBars { bars: series.len() },
            });
            continue;
        }

        info!(%symbol, bars = series.len(), "loaded");
        series_list.push(series);
    }

    if series_list.is_empty() {
        return Err(SigtraderError::InsufficientData {
            symbol: "all".to_string(),
            bars: 0,
            minimum: minimum_bars,
        });
    }

    let universe = Universe {
        series: series_list,
    };
    if !skipped.is_empty() {
        info!("using {} of {} symbols", universe.count(), total);
    }

    Ok(UniverseValidationResult { universe, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;

    struct MapDataPort {
        data: HashMap<String, usize>,
    }

    impl DataPort for MapDataPort {
        fn fetch_series(&self, symbol: &str, timeframe: Duration) -> Result<Series, SigtraderError> {
            let n = *self.data.get(symbol).ok_or_else(|| SigtraderError::NoData {
                symbol: symbol.to_string(),
            })?;
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let bars = (0..n)
                .map(|i| OhlcvBar {
                    timestamp: start + timeframe * i as i32,
                    open: 10.0,
                    high: 11.0,
                    low: 9.0,
                    close: 10.0,
                    volume: 5.0,
                })
                .collect();
            Series::new(symbol, timeframe, bars)
        }

        fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
            Ok(self.data.keys().cloned().collect())
        }

        fn get_data_range(
            &self,
            _symbol: &str,
        ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, SigtraderError> {
            Ok(None)
        }
    }

    fn port() -> MapDataPort {
        MapDataPort {
            data: HashMap::from([("BTC/USDT".to_string(), 60), ("ETH/USDT".to_string(), 5)]),
        }
    }

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols("BTC/USDT,ETH/USDT,SOL/USDT").unwrap();
        assert_eq!(result, vec!["BTC/USDT", "ETH/USDT", "SOL/USDT"]);
    }

    #[test]
    fn parse_symbols_trims_and_uppercases() {
        let result = parse_symbols("  btc/usdt , Eth/Usdt ").unwrap();
        assert_eq!(result, vec!["BTC/USDT", "ETH/USDT"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        assert_eq!(parse_symbols("BTC/USDT,,ETH/USDT"), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_symbols_duplicate() {
        let result = parse_symbols("BTC/USDT,ETH/USDT,btc/usdt");
        assert!(matches!(result, Err(UniverseError::DuplicateSymbol(s)) if s == "BTC/USDT"));
    }

    #[test]
    fn validate_universe_skips_short_and_missing() {
        let result = validate_universe(
            &port(),
            vec!["BTC/USDT".into(), "ETH/USDT".into(), "DOGE/USDT".into()],
            Duration::minutes(10),
            30,
        )
        .unwrap();
        assert_eq!(result.universe.symbols(), vec!["BTC/USDT"]);
        assert_eq!(result.universe.count(), 1);
        assert_eq!(
            result.skipped,
            vec![
                SkippedSymbol {
                    symbol: "ETH/USDT".into(),
                    reason: SkipReason::InsufficientBars { bars: 5 },
                },
                SkippedSymbol {
                    symbol: "DOGE/USDT".into(),
                    reason: SkipReason::NoData,
                },
            ]
        );
    }

    #[test]
    fn validate_universe_all_failed() {
        let err = validate_universe(&port(), vec!["ETH/USDT".into()], Duration::minutes(10), 30)
            .unwrap_err();
        assert!(matches!(err, SigtraderError::InsufficientData { minimum: 30, .. }));
    }
}
