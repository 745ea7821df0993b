use clap::Parser;
use sigtrader::cli::{configured_logging, init_tracing, run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logging = configured_logging(cli.command.config_path());
    if let Err(e) = init_tracing(&logging) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    run(cli)
}
