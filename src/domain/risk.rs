//! Position sizing and stop/take-profit placement.

use crate::domain::error::SigtraderError;
use crate::domain::signal::{Direction, Signal};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
    /// Largest share of account equity committed to one position, in (0, 1].
    pub max_position_fraction: f64,
    pub risk_reward_ratio: f64,
    /// Size granularity; order sizes are floored to a multiple of it.
    pub lot_size: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            max_position_fraction: 0.02,
            risk_reward_ratio: 2.0,
            lot_size: 0.000001,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), SigtraderError> {
        if !(self.max_position_fraction > 0.0 && self.max_position_fraction <= 1.0) {
            return Err(SigtraderError::invalid(
                "risk",
                "max_position_fraction",
                "max_position_fraction must be in (0, 1]",
            ));
        }
        if !(self.risk_reward_ratio > 0.0 && self.risk_reward_ratio.is_finite()) {
            return Err(SigtraderError::invalid(
                "risk",
                "risk_reward_ratio",
                "risk_reward_ratio must be positive",
            ));
        }
        if !(self.lot_size > 0.0 && self.lot_size.is_finite()) {
            return Err(SigtraderError::invalid(
                "risk",
                "lot_size",
                "lot_size must be positive",
            ));
        }
        Ok(())
    }
}

/// A sized order ready to be filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderIntent {
    pub direction: Direction,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("position size rounds to zero")]
    ZeroSize,
    #[error("stop distance is zero or on the wrong side of entry")]
    InvalidStopDistance,
}

/// Take-profit at `ratio` times the stop distance, on the profit side of entry.
///
/// Returns `None` when the stop is not strictly on the loss side.
pub fn take_profit_for(
    direction: Direction,
    entry_price: f64,
    stop_loss: f64,
    ratio: f64,
) -> Option<f64> {
    let distance = stop_distance(direction, entry_price, stop_loss)?;
    Some(entry_price + direction.multiplier() * ratio * distance)
}

fn stop_distance(direction: Direction, entry_price: f64, stop_loss: f64) -> Option<f64> {
    let distance = direction.multiplier() * (entry_price - stop_loss);
    (distance > 0.0 && distance.is_finite()).then_some(distance)
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Sizes an entry for `signal` at `entry_price`.
    ///
    /// size = min(fraction * equity, available) / entry, floored to the lot size.
    pub fn plan(
        &self,
        signal: &Signal,
        entry_price: f64,
        stop_loss: f64,
        reward_ratio: f64,
        account_equity: f64,
        available_capital: f64,
    ) -> Result<OrderIntent, Rejection> {
        let direction = signal.direction;
        let distance =
            stop_distance(direction, entry_price, stop_loss).ok_or(Rejection::InvalidStopDistance)?;
        let take_profit = entry_price + direction.multiplier() * reward_ratio * distance;

        let budget = (self.config.max_position_fraction * account_equity).min(available_capital);
        let raw_size = budget / entry_price;
        let lots = (raw_size / self.config.lot_size + 1e-9).floor();
        let size = lots * self.config.lot_size;
        if !(size > 0.0) || !size.is_finite() {
            return Err(Rejection::ZeroSize);
        }

        Ok(OrderIntent {
            direction,
            entry_price,
            size,
            stop_loss,
            take_profit,
        })
    }
}
