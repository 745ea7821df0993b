//! Fill simulation: slippage, commission, and intrabar exit detection.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::ohlcv::OhlcvBar;
use super::portfolio::Portfolio;
use super::position::{ExitReason, Position, Trade};
use super::signal::Direction;

/// When an accepted signal is filled. Fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Signal at bar i fills at the open of bar i+1.
    NextOpen,
    /// Signal at bar i fills at its own close; exits are checked from bar i+1.
    CurrentClose,
}

impl ExecutionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPolicy::NextOpen => "next_open",
            ExecutionPolicy::CurrentClose => "current_close",
        }
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "next_open" => Ok(ExecutionPolicy::NextOpen),
            "current_close" => Ok(ExecutionPolicy::CurrentClose),
            other => Err(format!(
                "unknown execution policy '{}', expected next_open or current_close",
                other
            )),
        }
    }
}

/// Trading cost parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Capital that can be committed so that notional plus commission fits in `cash`.
pub fn spendable_capital(cash: f64, config: &ExecutionConfig) -> f64 {
    ((cash - config.commission_per_trade) / (1.0 + config.commission_pct / 100.0)).max(0.0)
}

/// Entry fills move against the trader: buys pay up, short sales receive less.
pub fn apply_entry_slippage(market_price: f64, direction: Direction, slippage_pct: f64) -> f64 {
    market_price * (1.0 + direction.multiplier() * slippage_pct / 100.0)
}

/// Exit fills move against the trader: sells receive less, covers pay up.
pub fn apply_exit_slippage(market_price: f64, direction: Direction, slippage_pct: f64) -> f64 {
    market_price * (1.0 - direction.multiplier() * slippage_pct / 100.0)
}

/// Checks the bar's range against the position's stop and take-profit.
///
/// When both levels lie inside the range the stop wins. The returned price
/// is the triggered level, before slippage.
pub fn check_exit(position: &Position, bar: &OhlcvBar) -> Option<(ExitReason, f64)> {
    if position.should_stop_loss(bar) {
        Some((ExitReason::StopLoss, position.stop_loss))
    } else if position.should_take_profit(bar) {
        Some((ExitReason::TakeProfit, position.take_profit))
    } else {
        None
    }
}

/// Closes the open position at `market_price`, settling cash and recording the trade.
///
/// The trade's `exit_price` is `market_price`. Exit slippage moves the cash
/// fill against the trader and is booked as a separate cost.
pub fn close_position(
    portfolio: &mut Portfolio,
    market_price: f64,
    closed_at: DateTime<Utc>,
    exit_index: usize,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<Trade> {
    let position = portfolio.take_position()?;
    let fill_price = apply_exit_slippage(market_price, position.direction, config.slippage_pct);
    let slippage = position.unrealized_pnl(market_price) - position.unrealized_pnl(fill_price);
    let exit_commission = calculate_commission(position.size * fill_price, config);
    portfolio.settle(&position, fill_price, exit_commission);

    let realized_pnl =
        position.unrealized_pnl(fill_price) - position.entry_commission - exit_commission;
    let trade = Trade {
        strategy_id: position.strategy_id,
        symbol: position.symbol,
        direction: position.direction,
        entry_price: position.entry_price,
        exit_price: market_price,
        size: position.size,
        stop_loss: position.stop_loss,
        take_profit: position.take_profit,
        opened_at: position.opened_at,
        closed_at,
        exit_reason: reason,
        realized_pnl,
        commission: position.entry_commission + exit_commission,
        slippage,
        bars_held: exit_index.saturating_sub(position.entry_index),
    };
    portfolio.record_trade(trade.clone());
    Some(trade)
}
