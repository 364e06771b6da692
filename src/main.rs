//! laneguard: governed filesystem writes from the command line.
//!
//! Thin binary entry point; subcommand handlers live in `cli`.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use laneguard_commons::InstallationPaths;
use laneguard_config::DebugConfig;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    let config = cli::load_config(&args)?;
    initialize_tracing(&config.debug);
    tracing::debug!(root = %config.installation_root().display(), "configuration loaded");

    cli::run(args, config)
}

/// `RUST_LOG` wins; otherwise the `[debug]` section decides. Logs go to
/// stderr so stdout stays machine-readable.
fn initialize_tracing(debug: &DebugConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(debug.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}
