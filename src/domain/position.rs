//! Open positions and closed trades.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{Direction, StrategyId};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub direction: Direction,
    /// Fill price, slippage included.
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: DateTime<Utc>,
    pub entry_index: usize,
    pub entry_commission: f64,
}

impl Position {
    pub fn entry_notional(&self) -> f64 {
        self.size * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.multiplier() * self.size * (price - self.entry_price)
    }

    /// The bar's range reached the stop.
    pub fn should_stop_loss(&self, bar: &OhlcvBar) -> bool {
        match self.direction {
            Direction::Long => bar.low <= self.stop_loss,
            Direction::Short => bar.high >= self.stop_loss,
        }
    }

    /// The bar's range reached the take-profit.
    pub fn should_take_profit(&self, bar: &OhlcvBar) -> bool {
        match self.direction {
            Direction::Long => bar.high >= self.take_profit,
            Direction::Short => bar.low <= self.take_profit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ForcedClose,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::ForcedClose => "forced_close",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub exit_reason: ExitReason,
    /// Net of entry and exit commission and exit slippage.
    pub realized_pnl: f64,
    pub commission: f64,
    /// Cost of the exit fill landing away from `exit_price`.
    pub slippage: f64,
    pub bars_held: usize,
}

impl Trade {
    pub fn duration(&self) -> Duration {
        self.closed_at - self.opened_at
    }

    /// Net P&L relative to the entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.size * self.entry_price;
        if notional > 0.0 {
            self.realized_pnl / notional * 100.0
        } else {
            0.0
        }
    }
}
