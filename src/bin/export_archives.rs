//! Export Archives
//!
//! Runs the exporter once per daily archive and records a completed/failed
//! line per date in log/<name>_export.log.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use binance_archive_tools::dates::parse_calendar_date;
use binance_archive_tools::{select_dates, Config, DateOutcome, DateToken, ExportDriver, SystemRunner};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "export-archives")]
#[command(about = "Run the exporter over each daily Binance archive", long_about = None)]
struct Args {
    /// Path to the configuration YAML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Date to export (format: YYYYMMDD), may be repeated
    #[arg(short, long = "date", value_name = "DATE", conflicts_with_all = ["from", "to"])]
    dates: Vec<DateToken>,

    /// First date of an inclusive range (YYYYMMDD or YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "to", value_parser = parse_calendar_date)]
    from: Option<NaiveDate>,

    /// Last date of an inclusive range (YYYYMMDD or YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "from", value_parser = parse_calendar_date)]
    to: Option<NaiveDate>,

    /// Exit with status 1 when any date fails
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
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

    let range = args.from.zip(args.to);
    let dates = select_dates(&args.dates, range, &config.export.dates)
        .context("Failed to build date list")?;
    info!("Exporting {} dates with {}", dates.len(), config.export.exporter.program);

    let driver = ExportDriver::new(config.export, SystemRunner).with_progress_bar()?;
    let summary = driver.run(&dates).await?;

    let failed: Vec<String> = summary
        .reports
        .iter()
        .filter(|r| r.outcome == DateOutcome::Failed)
        .map(|r| r.date.to_string())
        .collect();
    if !failed.is_empty() {
        warn!("Failed dates: {}", failed.join(", "));
    }

    let code = summary.exit_code(args.strict);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
