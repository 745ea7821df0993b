//! Data access port trait.

use crate::domain::error::SigtraderError;
use crate::domain::series::Series;
use chrono::{DateTime, Duration, Utc};

pub trait DataPort {
    /// Loads every bar stored for `symbol`, validated as a [`Series`].
    fn fetch_series(&self, symbol: &str, timeframe: Duration) -> Result<Series, SigtraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError>;

    /// First and last timestamp plus bar count, `None` when nothing is stored.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, SigtraderError>;
}
