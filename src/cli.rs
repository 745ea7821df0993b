//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_many, BacktestJob, BacktestResult};
use crate::domain::config_validation::{load_run_config, RunConfig};
use crate::domain::error::SigtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::risk::RiskManager;
use crate::domain::series::Series;
use crate::domain::strategy::{SignalRule, Strategy};
use crate::domain::universe::{parse_symbols, validate_universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_OUTPUT_DIR: &str = "reports";

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Crypto signal scanner and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay every enabled strategy over every configured symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <BASE>_<QUOTE>.csv files
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Comma-separated symbols, e.g. BTC/USDT,ETH/USDT
        #[arg(short, long)]
        symbols: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate every enabled strategy on the latest bar of each symbol
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        symbols: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored data range for each configured symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

impl Command {
    pub fn config_path(&self) -> &Path {
        match self {
            Command::Backtest { config, .. }
            | Command::Signals { config, .. }
            | Command::Validate { config }
            | Command::Info { config, .. }
            | Command::ListSymbols { config, .. } => config,
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSettings {
    pub level: Option<String>,
    /// Log file appended to alongside stderr.
    pub file: Option<PathBuf>,
}

/// Reads `[logging]` from the config file. An unreadable file yields defaults;
/// the command itself reports the config error once logging is up.
pub fn configured_logging(path: &Path) -> LogSettings {
    let Ok(config) = FileConfigAdapter::from_file(path) else {
        return LogSettings::default();
    };
    let read = |key: &str| {
        config
            .get_string("logging", key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    LogSettings {
        level: read("level"),
        file: read("file").map(PathBuf::from),
    }
}

/// Opens `path` for appending, creating parent directories.
pub fn open_log_file(path: &Path) -> Result<File, SigtraderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Call once per process; a second call fails with [`SigtraderError::Logging`].
pub fn init_tracing(settings: &LogSettings) -> Result<(), SigtraderError> {
    let level = settings.level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file_layer = match &settings.file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| SigtraderError::Logging {
            reason: e.to_string(),
        })
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            symbols,
            output,
        } => run_backtest(&config, data, symbols.as_deref(), output),
        Command::Signals {
            config,
            data,
            symbols,
        } => run_signals(&config, data, symbols.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, data } => run_info(&config, data),
        Command::ListSymbols { config, data } => run_list_symbols(&config, data),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SigtraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Applies command line overrides on top of the file configuration.
fn resolve_run_config(
    config_path: &Path,
    data_override: Option<PathBuf>,
    symbols_override: Option<&str>,
) -> Result<RunConfig, SigtraderError> {
    let adapter = load_config(config_path)?;
    let mut run = load_run_config(&adapter)?;
    if let Some(dir) = data_override {
        run.data_dir = dir.display().to_string();
    }
    if let Some(raw) = symbols_override {
        run.symbols = parse_symbols(raw)
            .map_err(|e| SigtraderError::invalid("cli", "symbols", e.to_string()))?;
    }
    Ok(run)
}

/// Bars `strategy` needs before it can evaluate a single bar.
pub fn required_bars(strategy: &Strategy) -> usize {
    strategy.warmup_bars() + 1
}

/// Bars a symbol needs for at least one enabled strategy to evaluate.
pub fn minimum_bars(strategies: &[Strategy]) -> usize {
    strategies.iter().map(required_bars).min().unwrap_or(1)
}

/// Pairs every strategy with every series long enough for it.
fn build_jobs<'a>(strategies: &'a [Strategy], universe: &'a [Series]) -> Vec<BacktestJob<'a>> {
    let mut jobs = Vec::new();
    for strategy in strategies {
        for series in universe {
            if series.len() < required_bars(strategy) {
                warn!(
                    strategy = %strategy.id(),
                    symbol = %series.symbol,
                    bars = series.len(),
                    minimum = required_bars(strategy),
                    "skipping job: insufficient history"
                );
                continue;
            }
            jobs.push(BacktestJob { series, strategy });
        }
    }
    jobs
}

fn load_universe(run: &RunConfig) -> Result<Vec<Series>, SigtraderError> {
    let data_port = CsvAdapter::new(&run.data_dir);
    let validation = validate_universe(
        &data_port,
        run.symbols.clone(),
        run.timeframe,
        minimum_bars(&run.strategies),
    )?;
    for skipped in &validation.skipped {
        eprintln!("warning: skipping {} ({:?})", skipped.symbol, skipped.reason);
    }
    Ok(validation.universe.series)
}

pub fn run_backtest(
    config_path: &Path,
    data_override: Option<PathBuf>,
    symbols_override: Option<&str>,
    output: Option<PathBuf>,
) -> Result<(), SigtraderError> {
    let run = resolve_run_config(config_path, data_override, symbols_override)?;
    let universe = load_universe(&run)?;
    let risk = RiskManager::new(run.risk);

    let jobs = build_jobs(&run.strategies, &universe);

    info!(
        jobs = jobs.len(),
        symbols = universe.len(),
        strategies = run.strategies.len(),
        execution = %run.backtest.execution,
        "running backtests"
    );

    let output_dir = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let reporter = CsvReportAdapter;
    let mut first_error: Option<SigtraderError> = None;

    for (job, outcome) in jobs.iter().zip(run_many(&jobs, &risk, &run.backtest)) {
        match outcome {
            Ok(result) => {
                let metrics = Metrics::compute(&result, run.timeframe);
                print_summary(&result, &metrics);
                reporter.write(&result, &metrics, &output_dir)?;
            }
            Err(e) => {
                eprintln!(
                    "error: {} on {} failed: {}",
                    job.strategy.id(),
                    job.series.symbol,
                    e
                );
                first_error.get_or_insert(e);
            }
        }
    }

    eprintln!("\nReports written to: {}", output_dir.display());
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_summary(result: &BacktestResult, metrics: &Metrics) {
    eprintln!("\n=== {} on {} ===", result.strategy_id, result.symbol);
    eprintln!("Final Equity:     {:.2}", result.final_equity());
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!(
        "Exits:            {} stop / {} target / {} forced",
        metrics.stop_loss_exits, metrics.take_profit_exits, metrics.forced_closes
    );
    if metrics.skipped_signals > 0 {
        eprintln!("Skipped Signals:  {}", metrics.skipped_signals);
    }
}

pub fn run_signals(
    config_path: &Path,
    data_override: Option<PathBuf>,
    symbols_override: Option<&str>,
) -> Result<(), SigtraderError> {
    let run = resolve_run_config(config_path, data_override, symbols_override)?;
    let universe = load_universe(&run)?;
    let mut first_error: Option<SigtraderError> = None;

    for series in &universe {
        if let Err(e) = series.check_sequence() {
            eprintln!("error: {} rejected: {}", series.symbol, e);
            first_error.get_or_insert(e);
            continue;
        }
        let bars = series.bars();
        let Some(last) = series.last() else {
            continue;
        };
        println!(
            "\n=== {} @ {} (close {}) ===",
            series.symbol, last.timestamp, last.close
        );

        let mut fired = 0;
        for strategy in &run.strategies {
            if bars.len() < required_bars(strategy) {
                println!(
                    "[{}] needs {} bars, have {}",
                    strategy.id(),
                    required_bars(strategy),
                    bars.len()
                );
                continue;
            }
            let Some(signal) = strategy.generate_signal(bars) else {
                println!("[{}] no signal", strategy.id());
                continue;
            };
            let Some(take_profit) = strategy.calculate_take_profit(&signal, bars, &run.risk)
            else {
                warn!(
                    strategy = %strategy.id(),
                    symbol = %series.symbol,
                    "signal without a valid target"
                );
                continue;
            };
            fired += 1;
            println!(
                "[{}] Signal {}",
                strategy.id(),
                signal.direction.as_str().to_uppercase()
            );
            println!("  Entry:        {:.6}", signal.entry_price);
            println!("  Stop Loss:    {:.6}", signal.stop_loss);
            println!("  Take Profit:  {:.6}", take_profit);
            println!("  Confidence:   {:.0}%", signal.rationale.confidence * 100.0);
            println!("  Risk/Reward:  1:{:.1}", strategy.risk_reward_ratio(&run.risk));
            for (name, value) in &signal.rationale.facts {
                println!("  {:<13} {:.4}", format!("{}:", name), value);
            }
        }
        println!(
            "{}/{} strategies generated signals",
            fired,
            run.strategies.len()
        );
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub fn run_validate(config_path: &Path) -> Result<(), SigtraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    let run = load_run_config(&adapter)?;

    eprintln!("\nBacktest:");
    eprintln!("  execution:       {}", run.backtest.execution);
    eprintln!("  initial_capital: {}", run.backtest.initial_capital);
    eprintln!("  timeframe:       {}s", run.timeframe.num_seconds());
    eprintln!("  symbols:         {}", run.symbols.join(", "));
    eprintln!("  data_dir:        {}", run.data_dir);

    eprintln!("\nRisk:");
    eprintln!("  max_position_fraction: {}", run.risk.max_position_fraction);
    eprintln!("  risk_reward_ratio:     {}", run.risk.risk_reward_ratio);
    eprintln!("  lot_size:              {}", run.risk.lot_size);

    eprintln!("\nStrategies:");
    for strategy in &run.strategies {
        let indicators: Vec<String> = strategy
            .required_indicators()
            .iter()
            .map(|i| i.to_string())
            .collect();
        eprintln!(
            "  {} (warm-up {} bars): {}",
            strategy.id(),
            strategy.warmup_bars(),
            indicators.join(", ")
        );
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn data_port_for(
    config_path: &Path,
    data_override: Option<PathBuf>,
) -> Result<(CsvAdapter, RunConfig), SigtraderError> {
    let run = resolve_run_config(config_path, data_override, None)?;
    Ok((CsvAdapter::new(&run.data_dir), run))
}

pub fn run_info(config_path: &Path, data_override: Option<PathBuf>) -> Result<(), SigtraderError> {
    let (data_port, run) = data_port_for(config_path, data_override)?;
    for symbol in &run.symbols {
        match data_port.get_data_range(symbol)? {
            Some((first, last, count)) => {
                println!("{}: {} bars, {} to {}", symbol, count, first, last);
            }
            None => eprintln!("{}: no data found", symbol),
        }
    }
    Ok(())
}

pub fn run_list_symbols(
    config_path: &Path,
    data_override: Option<PathBuf>,
) -> Result<(), SigtraderError> {
    let (data_port, run) = data_port_for(config_path, data_override)?;
    let symbols = data_port.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found in {}", run.data_dir);
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}
