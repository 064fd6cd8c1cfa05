//! Sync Archives
//!
//! Mirrors the daily `.tar.gz` archives from $REMOTE into the local archive
//! directory with rsync over a SOCKS-proxied SSH connection.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use binance_archive_tools::config::REMOTE_ENV;
use binance_archive_tools::{Config, SyncDriver, SystemRunner};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "sync-archives")]
#[command(about = "Pull daily Binance archives from the remote recorder", long_about = None)]
struct Args {
    /// Path to the configuration YAML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Remote endpoint (user@host)
    #[arg(long, env = REMOTE_ENV, hide_env_values = true)]
    remote: Option<String>,

    /// Show what would be transferred without copying anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // REMOTE may live in .env
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    let driver = SyncDriver::new(config.sync, SystemRunner).dry_run(args.dry_run);
    let code = driver.sync(args.remote.as_deref()).await?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
