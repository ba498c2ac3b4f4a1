pub mod aws;
pub mod core;
pub mod domain;
pub mod issuance;
pub mod notify;
pub mod secrets;
pub mod storage;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use crate::core::{commands, config::Cli};

/// Parses the command line and runs one obtain pass.
///
/// Only configuration problems and backend construction failures surface as
/// errors; per-domain failures are logged and the run still succeeds.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.into_config().map_err(|err| {
        error!("[config] {err}");
        err
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("unable to start async runtime")?;

    let outcomes = runtime.block_on(commands::obtain(config))?;
    info!("[certpilot] processed {} domain(s)", outcomes.len());

    // Timed-out domains may still hold blocking threads.
    runtime.shutdown_timeout(Duration::from_secs(5));
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
