//! hostkeep-token: manage automation tokens for scripted host access
//!
//! Tokens let scripts run a command on one named host without the master
//! password. This binary mints, lists, revokes and syncs them; the raw token
//! is shown once and never stored.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hostkeep_cli::{run, Cli, Context};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    // stdout carries command output only
    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::open(args.data_dir)
        .map_err(|e| format!("Failed to open data directory: {}", e))?;

    run(&ctx, args.command).await?;

    Ok(())
}
