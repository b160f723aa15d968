//! Command-line disk reconfiguration for vCloud-style virtual machines
//!
//! Provides commands for:
//! - Listing a machine's disks and available storage profiles
//! - Attaching, detaching and growing disks

pub mod commands;
pub mod config;
pub mod output;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use commands::{run, Cli, Command};
pub use config::{Config, ConfigError};

// =============================================================================
// Tracing Initialization
// =============================================================================

/// Initialize tracing/logging with the given filter level
///
/// `RUST_LOG` takes precedence over `filter`. Events go to stderr so
/// command output on stdout stays clean.
pub fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
