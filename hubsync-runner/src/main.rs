//! `hubsync` binary.
//!
//! Loads configuration, initializes tracing and Sentry, then runs a sync or a rebuild on a
//! single-threaded runtime. `sync` exits with a failure status when the number of new
//! observations is unknown.

use std::process::ExitCode;

use clap::Parser;
use hubsync_telemetry::tracing::init_tracing;
use tracing::error;

use crate::cli::Cli;
use crate::config::load_app_config;
use crate::core::run_command;
use crate::error::{RunnerError, RunnerResult};

mod cli;
mod config;
mod core;
mod error;
mod sentry;

/// The name of the environment variable which contains version information for this binary.
const APP_VERSION_ENV_NAME: &str = "APP_VERSION";

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> RunnerResult<ExitCode> {
    let config = load_app_config(&cli)?;

    let _log_flusher =
        init_tracing(env!("CARGO_BIN_NAME"), cli.log_format).map_err(RunnerError::config)?;

    // Sentry must be initialized before the runtime starts.
    let _sentry_guard = sentry::init(&config)?;

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run_command(&config, &cli.command));

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            sentry::capture_error(&err);
            error!("{err}");
            return Err(err);
        }
    };

    match report.render() {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => error!(error = %err, "could not render the run report"),
    }

    Ok(report.exit_code())
}
