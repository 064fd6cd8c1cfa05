//! Binance Exporter
//!
//! Rebuilds BTCUSDT order books from one daily archive and writes the top
//! ten levels of every snapshot session to Parquet.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use binance_archive_tools::export_archive;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "binance-exporter")]
#[command(about = "Export top-10 order book history from a daily archive", long_about = None)]
struct Args {
    /// Path to the tar.gz file
    #[arg(long = "tar_file_path", value_name = "FILE")]
    tar_file_path: PathBuf,

    /// Output directory
    #[arg(long = "out_dir", value_name = "DIR")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    info!("Exporting {:?} into {:?}", args.tar_file_path, args.out_dir);

    let written = export_archive(&args.tar_file_path, &args.out_dir)?;
    info!("Processing completed successfully! {} files written", written.len());
    Ok(())
}
