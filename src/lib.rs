//! Binance Archive Tools Library
//!
//! This library drives the daily Binance order-book archive pipeline:
//! mirroring `.tar.gz` archives from a remote recorder over a SOCKS-proxied
//! rsync, running an exporter over each daily archive, and the exporter
//! itself, which rebuilds BTCUSDT order books and writes the top ten levels
//! to Parquet.
//!
//! Drivers:
//! - Remote sync: SyncDriver
//! - Per-date export: ExportDriver
//! - Archive export: export_archive

pub mod config;
pub mod dates;
pub mod process_runner;
pub mod run_log;
pub mod export_driver;
pub mod sync_driver;
pub mod orderbook;
pub mod archive_reader;
pub mod book_export;
pub mod parquet_writer;

// Re-export commonly used types
pub use config::{Config, ConfigError, ExportConfig, ExporterCommand, SyncConfig};
pub use dates::{date_range, default_dates, select_dates, DateError, DateToken};
pub use process_runner::{CommandSpec, OutputMode, ProcessOutput, ProcessRunner, SystemRunner};
pub use run_log::RunLog;
pub use export_driver::{DateOutcome, DateReport, ExportDriver, ExportSummary};
pub use sync_driver::SyncDriver;
pub use orderbook::{OrderBook, OrderBookError, PartialUpdate, PriceLevel, Snapshot};
pub use archive_reader::{ArchiveError, ArchiveReader};
pub use book_export::{export_archive, BookHistory, SessionSet};
