//! Account state for one (strategy, symbol) replay.
//!
//! Entries escrow the full notional plus commission from cash for both
//! directions. Realized equity ignores open P&L; marked equity includes it.

use chrono::{DateTime, Utc};

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// Initial capital plus realized P&L.
    pub equity: f64,
    /// Realized equity with any open position marked at the bar close.
    pub marked_equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Escrows the position cost. Replaces nothing: callers open only when flat.
    pub fn open(&mut self, position: Position) {
        debug_assert!(self.position.is_none());
        self.cash -= position.entry_notional() + position.entry_commission;
        self.position = Some(position);
    }

    pub fn take_position(&mut self) -> Option<Position> {
        self.position.take()
    }

    /// Settles a closed position: escrow back plus price P&L minus exit commission.
    pub fn settle(&mut self, position: &Position, exit_price: f64, exit_commission: f64) {
        self.cash +=
            position.entry_notional() + position.unrealized_pnl(exit_price) - exit_commission;
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn realized_equity(&self) -> f64 {
        match &self.position {
            Some(pos) => self.cash + pos.entry_notional() + pos.entry_commission,
            None => self.cash,
        }
    }

    pub fn marked_equity(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => self.cash + pos.entry_notional() + pos.unrealized_pnl(price),
            None => self.cash,
        }
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, close: f64) {
        let point = EquityPoint {
            timestamp,
            equity: self.realized_equity(),
            marked_equity: self.marked_equity(close),
        };
        self.equity_curve.push(point);
    }

    /// Recomputes the most recent equity point after an end-of-run settlement.
    pub fn restate_last_equity(&mut self, close: f64) {
        let equity = self.realized_equity();
        let marked_equity = self.marked_equity(close);
        if let Some(last) = self.equity_curve.last_mut() {
            last.equity = equity;
            last.marked_equity = marked_equity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{Direction, StrategyId};
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn sample_position(direction: Direction) -> Position {
        Position {
            strategy_id: StrategyId::VolumeBreakout,
            symbol: "BTC/USDT".into(),
            direction,
            entry_price: 100.0,
            size: 10.0,
            stop_loss: 95.0,
            take_profit: 110.0,
            opened_at: ts(),
            entry_index: 0,
            entry_commission: 2.0,
        }
    }

    #[test]
    fn new_portfolio() {
        let p = Portfolio::new(10_000.0);
        assert_eq!(p.cash, 10_000.0);
        assert!(p.is_flat());
        assert!(p.trades.is_empty());
        assert!(p.equity_curve.is_empty());
    }

    #[test]
    fn open_escrows_cost_but_keeps_realized_equity() {
        let mut p = Portfolio::new(10_000.0);
        p.open(sample_position(Direction::Long));
        assert!((p.cash - 8_998.0).abs() < 1e-9);
        assert!((p.realized_equity() - 10_000.0).abs() < 1e-9);
        assert!((p.marked_equity(105.0) - 10_048.0).abs() < 1e-9);
    }

    #[test]
    fn settle_long_and_short() {
        let mut p = Portfolio::new(10_000.0);
        p.open(sample_position(Direction::Long));
        let pos = p.take_position().unwrap();
        p.settle(&pos, 110.0, 3.0);
        // +100 price pnl, -2 entry, -3 exit
        assert!((p.cash - 10_095.0).abs() < 1e-9);

        let mut p = Portfolio::new(10_000.0);
        p.open(sample_position(Direction::Short));
        let pos = p.take_position().unwrap();
        p.settle(&pos, 110.0, 0.0);
        assert!((p.cash - 9_898.0).abs() < 1e-9);
    }

    #[test]
    fn record_equity_tracks_both_curves() {
        let mut p = Portfolio::new(1_000.0);
        p.record_equity(ts(), 50.0);
        p.open(Position {
            size: 1.0,
            entry_commission: 0.0,
            ..sample_position(Direction::Long)
        });
        p.record_equity(ts(), 120.0);
        assert_eq!(p.equity_curve[1].equity, 1_000.0);
        assert_eq!(p.equity_curve[1].marked_equity, 1_020.0);

        let pos = p.take_position().unwrap();
        p.settle(&pos, 120.0, 0.0);
        p.restate_last_equity(120.0);
        assert_eq!(p.equity_curve[1].equity, 1_020.0);
        assert_eq!(p.equity_curve.len(), 2);
    }
}
