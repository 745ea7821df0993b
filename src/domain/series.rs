//! Validated bar series for a single symbol at a fixed timeframe.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::Duration;

#[derive(Debug, Clone)]
pub struct Series {
    pub symbol: String,
    pub timeframe: Duration,
    bars: Vec<OhlcvBar>,
}

impl Series {
    /// Builds a series, rejecting any bar that violates the OHLCV invariants.
    ///
    /// Ordering and spacing are not enforced here; see [`Series::check_sequence`].
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Duration,
        bars: Vec<OhlcvBar>,
    ) -> Result<Self, SigtraderError> {
        if timeframe <= Duration::zero() {
            return Err(SigtraderError::DataIntegrity {
                index: 0,
                reason: "timeframe must be positive".into(),
            });
        }
        for (index, bar) in bars.iter().enumerate() {
            bar.validate()
                .map_err(|reason| SigtraderError::DataIntegrity { index, reason })?;
        }
        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        })
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }

    /// Verifies strictly increasing timestamps spaced exactly one timeframe apart.
    pub fn check_sequence(&self) -> Result<(), SigtraderError> {
        for index in 1..self.bars.len() {
            check_step(&self.bars[index - 1], &self.bars[index], self.timeframe, index)?;
        }
        Ok(())
    }
}

/// Validates that `next` directly follows `prev` at the given timeframe.
pub fn check_step(
    prev: &OhlcvBar,
    next: &OhlcvBar,
    timeframe: Duration,
    index: usize,
) -> Result<(), SigtraderError> {
    let step = next.timestamp - prev.timestamp;
    if step == Duration::zero() {
        return Err(SigtraderError::Sequence {
            index,
            reason: format!("duplicate bar at {}", next.timestamp),
        });
    }
    if step < Duration::zero() {
        return Err(SigtraderError::Sequence {
            index,
            reason: format!(
                "out-of-order bar {} after {}",
                next.timestamp, prev.timestamp
            ),
        });
    }
    if step != timeframe {
        return Err(SigtraderError::Sequence {
            index,
            reason: format!(
                "gap of {}s between {} and {} (expected {}s)",
                step.num_seconds(),
                prev.timestamp,
                next.timestamp,
                timeframe.num_seconds()
            ),
        });
    }
    Ok(())
}
