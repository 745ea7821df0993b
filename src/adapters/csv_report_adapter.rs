//! CSV report adapter.
//!
//! Each run writes three files under the output directory, prefixed
//! `<strategy>_<BASE>_<QUOTE>`:
//! - `_trades.csv`: one row per closed trade
//! - `_equity.csv`: one row per bar
//! - `_summary.csv`: a single row of metrics

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SigtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::EquityPoint;
use crate::domain::position::Trade;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct TradeRecord<'a> {
    strategy: &'a str,
    symbol: &'a str,
    direction: &'a str,
    opened_at: String,
    closed_at: String,
    entry_price: f64,
    exit_price: f64,
    size: f64,
    stop_loss: f64,
    take_profit: f64,
    exit_reason: &'a str,
    commission: f64,
    slippage: f64,
    realized_pnl: f64,
    return_pct: f64,
    bars_held: usize,
    duration_secs: i64,
}

impl<'a> From<&'a Trade> for TradeRecord<'a> {
    fn from(t: &'a Trade) -> Self {
        TradeRecord {
            strategy: t.strategy_id.as_str(),
            symbol: &t.symbol,
            direction: t.direction.as_str(),
            opened_at: t.opened_at.to_rfc3339(),
            closed_at: t.closed_at.to_rfc3339(),
            entry_price: t.entry_price,
            exit_price: t.exit_price,
            size: t.size,
            stop_loss: t.stop_loss,
            take_profit: t.take_profit,
            exit_reason: t.exit_reason.as_str(),
            commission: t.commission,
            slippage: t.slippage,
            realized_pnl: t.realized_pnl,
            return_pct: t.return_pct(),
            bars_held: t.bars_held,
            duration_secs: t.duration().num_seconds(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EquityRecord {
    timestamp: String,
    equity: f64,
    marked_equity: f64,
}

impl From<&EquityPoint> for EquityRecord {
    fn from(p: &EquityPoint) -> Self {
        EquityRecord {
            timestamp: p.timestamp.to_rfc3339(),
            equity: p.equity,
            marked_equity: p.marked_equity,
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryRecord<'a> {
    strategy: &'a str,
    symbol: &'a str,
    initial_capital: f64,
    final_equity: f64,
    total_return: f64,
    sharpe_ratio: f64,
    sortino_ratio: f64,
    max_drawdown: f64,
    max_drawdown_duration: usize,
    total_trades: usize,
    win_rate: f64,
    profit_factor: f64,
    avg_win: f64,
    avg_loss: f64,
    stop_loss_exits: usize,
    take_profit_exits: usize,
    forced_closes: usize,
    skipped_signals: usize,
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn file_prefix(result: &BacktestResult) -> String {
        format!(
            "{}_{}",
            result.strategy_id.as_str(),
            result.symbol.replace('/', "_")
        )
    }
}

fn write_rows<I, R>(path: &Path, rows: I) -> Result<(), SigtraderError>
where
    I: IntoIterator<Item = R>,
    R: Serialize,
{
    let report_err = |e: csv::Error| SigtraderError::Report {
        reason: format!("{}: {}", path.display(), e),
    };
    let mut wtr = csv::Writer::from_path(path).map_err(report_err)?;
    for row in rows {
        wtr.serialize(row).map_err(report_err)?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, SigtraderError> {
        fs::create_dir_all(output_dir)?;
        let prefix = Self::file_prefix(result);

        let trades_path = output_dir.join(format!("{}_trades.csv", prefix));
        let equity_path = output_dir.join(format!("{}_equity.csv", prefix));
        let summary_path = output_dir.join(format!("{}_summary.csv", prefix));

        write_rows(&trades_path, result.trades.iter().map(TradeRecord::from))?;
        write_rows(&equity_path, result.equity_curve.iter().map(EquityRecord::from))?;
        write_rows(
            &summary_path,
            [SummaryRecord {
                strategy: result.strategy_id.as_str(),
                symbol: &result.symbol,
                initial_capital: result.initial_capital,
                final_equity: result.final_equity(),
                total_return: metrics.total_return,
                sharpe_ratio: metrics.sharpe_ratio,
                sortino_ratio: metrics.sortino_ratio,
                max_drawdown: metrics.max_drawdown,
                max_drawdown_duration: metrics.max_drawdown_duration,
                total_trades: metrics.total_trades,
                win_rate: metrics.win_rate,
                profit_factor: metrics.profit_factor,
                avg_win: metrics.avg_win,
                avg_loss: metrics.avg_loss,
                stop_loss_exits: metrics.stop_loss_exits,
                take_profit_exits: metrics.take_profit_exits,
                forced_closes: metrics.forced_closes,
                skipped_signals: metrics.skipped_signals,
            }],
        )?;

        info!(prefix = %prefix, dir = %output_dir.display(), "report written");
        Ok(vec![trades_path, equity_path, summary_path])
    }
}
