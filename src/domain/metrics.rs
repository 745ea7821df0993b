//! Performance metrics over a finished backtest.
//!
//! Drawdown and risk-adjusted ratios use the marked equity curve; returns
//! are annualised by the number of bars in a 365-day year.

use chrono::Duration;

use super::backtest::BacktestResult;
use super::portfolio::EquityPoint;
use super::position::ExitReason;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of bars below a prior peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_bars_held: f64,
    pub stop_loss_exits: usize,
    pub take_profit_exits: usize,
    pub forced_closes: usize,
    pub skipped_signals: usize,
}

/// Bars per year for a bar spacing, 0 when the spacing is not positive.
pub fn periods_per_year(timeframe: Duration) -> f64 {
    let seconds = timeframe.num_seconds();
    if seconds > 0 {
        SECONDS_PER_YEAR / seconds as f64
    } else {
        0.0
    }
}

impl Metrics {
    pub fn compute(result: &BacktestResult, timeframe: Duration) -> Self {
        let initial_capital = result.initial_capital;
        let final_equity = result.final_equity();
        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&result.equity_curve);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&result.equity_curve, periods_per_year(timeframe));

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_bars_held = 0usize;
        let (mut stop_loss_exits, mut take_profit_exits, mut forced_closes) = (0, 0, 0);

        for trade in &result.trades {
            let pnl = trade.realized_pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_bars_held += trade.bars_held;
            match trade.exit_reason {
                ExitReason::StopLoss => stop_loss_exits += 1,
                ExitReason::TakeProfit => take_profit_exits += 1,
                ExitReason::ForcedClose => forced_closes += 1,
            }
        }

        let total_trades = result.trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_bars_held = if total_trades > 0 {
            total_bars_held as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_bars_held,
            stop_loss_exits,
            take_profit_exits,
            forced_closes,
            skipped_signals: result.skipped.len(),
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.marked_equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        let equity = point.marked_equity;
        if equity >= peak {
            peak = equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], periods_per_year: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].marked_equity;
            let curr = w[1].marked_equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let annualise = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        mean / stddev * annualise
    } else {
        0.0
    };

    let downside_variance: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside_variance.sqrt();

    let sortino = if downside_stddev > 0.0 {
        mean / downside_stddev * annualise
    } else {
        0.0
    };

    (sharpe, sortino)
}
