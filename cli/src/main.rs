//! Disk reconfiguration tool for vCloud-style virtual machines
//!
//! Configuration is loaded from vdisk.toml in the working directory unless
//! --config names another file.
//!
//! Exit status is 0 when the operation succeeded, 1 when a change timed out
//! or was not confirmed, and 2 on error.

use std::process::ExitCode;

use clap::Parser;
use vdisk_cli::{init_tracing, run, Cli, Config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    // Initialize tracing
    init_tracing(&config.logging.level);

    match run(cli, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
