//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SigtraderError;
use crate::domain::metrics::Metrics;
use std::path::{Path, PathBuf};

/// Port for persisting the outcome of one backtest run.
pub trait ReportPort {
    /// Writes the report and returns the paths it created.
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, SigtraderError>;
}
