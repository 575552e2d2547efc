mod app;
mod cli;
mod headless;
mod logging;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use palcon_host::{FileStore, HostError};

use crate::{
    cli::Cli,
    logging::{LoggingConfig, init_logging},
};

fn main() -> Result<()> {
    // panic hook
    color_eyre::install()?;

    // Initialize structured logging
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(&logging_config).wrap_err("Failed to initialize logging")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "palcon starting up");

    // parse command line arguments
    let cli = Cli::parse();
    cli.validate()?;

    let wasm = std::fs::read(&cli.wasm)
        .wrap_err_with(|| format!("Failed to read guest module {}", cli.wasm.display()))?;

    let files = match &cli.assets {
        Some(dir) => FileStore::from_dir(dir).map_err(HostError::Assets)?,
        None => FileStore::new(),
    };
    tracing::info!(files = files.len(), "file store ready");

    match cli.headless {
        Some(frames) => headless::run(&cli, &wasm, files, frames),
        None => app::run(&cli, wasm, files),
    }
}
