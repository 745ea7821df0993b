//! CSV file data adapter.
//!
//! One file per symbol, `<dir>/<BASE>_<QUOTE>.csv`, with the header
//! `timestamp,open,high,low,close,volume`. Timestamps may be RFC 3339,
//! `YYYY-MM-DD HH:MM:SS` in UTC, or integer epoch milliseconds.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::series::Series;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const SUFFIX: &str = ".csv";
const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path
            .join(format!("{}{}", symbol.replace('/', "_"), SUFFIX))
    }

    /// Reads every bar in file order. A missing file is [`SigtraderError::NoData`].
    fn read_bars(&self, symbol: &str) -> Result<Vec<OhlcvBar>, SigtraderError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SigtraderError::NoData {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => {
                return Err(SigtraderError::Data {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let header = rdr.headers().map_err(|e| SigtraderError::Data {
            reason: format!("{}: CSV parse error: {}", path.display(), e),
        })?;
        if header.is_empty() {
            return Ok(Vec::new());
        }
        check_header(header).map_err(|reason| SigtraderError::DataIntegrity {
            index: 0,
            reason: format!("{}: {}", path.display(), reason),
        })?;

        let mut bars = Vec::new();
        for (index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| SigtraderError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let timestamp = parse_timestamp(field(&record, 0, "timestamp", index)?)
                .map_err(|reason| SigtraderError::DataIntegrity { index, reason })?;
            bars.push(OhlcvBar {
                timestamp,
                open: number(&record, 1, "open", index)?,
                high: number(&record, 2, "high", index)?,
                low: number(&record, 3, "low", index)?,
                close: number(&record, 4, "close", index)?,
                volume: number(&record, 5, "volume", index)?,
            });
        }
        debug!(symbol, bars = bars.len(), path = %path.display(), "loaded csv");
        Ok(bars)
    }
}

/// Columns must appear exactly in `COLUMNS` order; values are read by position.
fn check_header(header: &csv::StringRecord) -> Result<(), String> {
    let found: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    if found.iter().map(String::as_str).eq(COLUMNS) {
        Ok(())
    } else {
        Err(format!(
            "unexpected header '{}', expected '{}'",
            found.join(","),
            COLUMNS.join(",")
        ))
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    column: usize,
    name: &str,
    index: usize,
) -> Result<&'r str, SigtraderError> {
    record
        .get(column)
        .map(str::trim)
        .ok_or_else(|| SigtraderError::DataIntegrity {
            index,
            reason: format!("missing {} column", name),
        })
}

fn number(
    record: &csv::StringRecord,
    column: usize,
    name: &str,
    index: usize,
) -> Result<f64, SigtraderError> {
    let raw = field(record, column, name, index)?;
    raw.parse::<f64>()
        .map_err(|e| SigtraderError::DataIntegrity {
            index,
            reason: format!("invalid {} value '{}': {}", name, raw, e),
        })
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| format!("epoch millis {} out of range", millis));
    }
    Err(format!("unrecognised timestamp '{}'", raw))
}

impl DataPort for CsvAdapter {
    fn fetch_series(&self, symbol: &str, timeframe: Duration) -> Result<Series, SigtraderError> {
        let bars = self.read_bars(symbol)?;
        if bars.is_empty() {
            return Err(SigtraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Series::new(symbol, timeframe, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SigtraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SigtraderError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(SUFFIX) {
                if let Some((base, quote)) = stem.split_once('_') {
                    symbols.push(format!("{}/{}", base, quote));
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, SigtraderError> {
        let bars = match self.read_bars(symbol) {
            Ok(bars) => bars,
            Err(SigtraderError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let first = bars.iter().map(|b| b.timestamp).min();
        let last = bars.iter().map(|b| b.timestamp).max();
        Ok(first.zip(last).map(|(first, last)| (first, last, bars.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15T00:00:00Z,100.0,110.0,90.0,105.0,50000\n\
            2024-01-15 00:10:00,105.0,115.0,100.0,110.0,60000.5\n\
            1705277400000,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BTC_USDT.csv"), csv_content).unwrap();
        fs::write(
            path.join("ETH_USDT.csv"),
            "timestamp,open,high,low,close,volume\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_series_reads_all_timestamp_formats() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter
            .fetch_series("BTC/USDT", Duration::minutes(10))
            .unwrap();

        assert_eq!(series.len(), 3);
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let bars = series.bars();
        assert_eq!(bars[0].timestamp, start);
        assert_eq!(bars[1].timestamp, start + Duration::minutes(10));
        assert_eq!(bars[2].timestamp, start + Duration::minutes(20));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[1].volume, 60000.5);
        assert!(series.check_sequence().is_ok());
    }

    #[test]
    fn missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let err = adapter
            .fetch_series("XRP/USDT", Duration::minutes(10))
            .unwrap_err();
        assert!(matches!(err, SigtraderError::NoData { ref symbol } if symbol == "XRP/USDT"));
    }

    #[test]
    fn header_only_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter
            .fetch_series("ETH/USDT", Duration::minutes(10))
            .unwrap_err();
        assert!(matches!(err, SigtraderError::NoData { .. }));
    }

    #[test]
    fn malformed_row_reports_its_index() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("SOL_USDT.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-15T00:00:00Z,1,2,0.5,1.5,10\n\
             2024-01-15T00:10:00Z,1,abc,0.5,1.5,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path());
        let err = adapter
            .fetch_series("SOL/USDT", Duration::minutes(10))
            .unwrap_err();
        assert!(matches!(err, SigtraderError::DataIntegrity { index: 1, .. }));
    }

    #[test]
    fn reordered_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("SOL_USDT.csv"),
            "timestamp,open,high,low,volume,close\n\
             2024-01-15T00:00:00Z,1,2,0.5,10,1.5\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path());
        let err = adapter
            .fetch_series("SOL/USDT", Duration::minutes(10))
            .unwrap_err();
        assert!(matches!(err, SigtraderError::DataIntegrity { index: 0, .. }));
        assert!(err.to_string().contains("unexpected header"));
    }

    #[test]
    fn header_case_and_spacing_are_tolerated() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("SOL_USDT.csv"),
            "Timestamp, Open, High, Low, Close, Volume\n\
             2024-01-15T00:00:00Z,1,2,0.5,1.5,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path());
        let series = adapter
            .fetch_series("SOL/USDT", Duration::minutes(10))
            .unwrap();
        assert_eq!(series.bars()[0].close, 1.5);
    }

    #[test]
    fn empty_file_is_no_data() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("SOL_USDT.csv"), "").unwrap();
        let adapter = CsvAdapter::new(dir.path());
        let err = adapter
            .fetch_series("SOL/USDT", Duration::minutes(10))
            .unwrap_err();
        assert!(matches!(err, SigtraderError::NoData { .. }));
    }

    #[test]
    fn inconsistent_bar_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("SOL_USDT.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-15T00:00:00Z,1,0.9,0.5,0.8,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path());
        let err = adapter
            .fetch_series("SOL/USDT", Duration::minutes(10))
            .unwrap_err();
        assert!(matches!(err, SigtraderError::DataIntegrity { index: 0, .. }));
    }

    #[test]
    fn list_symbols_maps_file_names() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let symbols = adapter.list_symbols().unwrap();
        assert_eq!(symbols, vec!["BTC/USDT", "ETH/USDT"]);
    }

    #[test]
    fn data_range_reports_span_and_count() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let (first, last, count) = adapter.get_data_range("BTC/USDT").unwrap().unwrap();
        assert_eq!(count, 3);
        assert_eq!(last - first, Duration::minutes(20));
        assert_eq!(adapter.get_data_range("XRP/USDT").unwrap(), None);
    }

    #[test]
    fn timestamp_parsing() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Ok(expected));
        assert_eq!(parse_timestamp("2024-03-01T13:30:00+01:00"), Ok(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Ok(expected));
        assert_eq!(
            parse_timestamp(&expected.timestamp_millis().to_string()),
            Ok(expected)
        );
        assert!(parse_timestamp("yesterday").is_err());
    }
}
