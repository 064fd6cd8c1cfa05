//! Snapshot-session export of a daily archive
//!
//! Each snapshot in the archive seeds its own order book. Every depth update
//! is offered to every live book; whenever a book accepts one, its top ten
//! levels are appended to that book's history. A book that hits a sequence
//! gap is dropped and keeps the history recorded so far.

use anyhow::{Context, Result};
use chrono::DateTime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::archive_reader::ArchiveReader;
use crate::orderbook::{OrderBook, PartialUpdate, PriceLevel, Snapshot};
use crate::parquet_writer::write_book_history;

/// Levels recorded per side
pub const TOP_LEVELS: usize = 10;

/// Log every this many recorded updates per book
const PROGRESS_INTERVAL: usize = 1000;

const FILE_TS_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Top-of-book history of one session; missing levels are `NaN`
#[derive(Debug, Clone, Default)]
pub struct BookHistory {
    pub bids10: Vec<[f32; TOP_LEVELS]>,
    pub asks10: Vec<[f32; TOP_LEVELS]>,
    pub bids10_size: Vec<[f32; TOP_LEVELS]>,
    pub asks10_size: Vec<[f32; TOP_LEVELS]>,
}

impl BookHistory {
    pub fn record(&mut self, book: &OrderBook) {
        let (bid_prices, bid_sizes) = top_levels(book.best_bids(TOP_LEVELS));
        let (ask_prices, ask_sizes) = top_levels(book.best_asks(TOP_LEVELS));
        self.bids10.push(bid_prices);
        self.bids10_size.push(bid_sizes);
        self.asks10.push(ask_prices);
        self.asks10_size.push(ask_sizes);
    }

    pub fn len(&self) -> usize {
        self.bids10.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids10.is_empty()
    }
}

fn top_levels<'a>(levels: impl Iterator<Item = &'a PriceLevel>) -> ([f32; TOP_LEVELS], [f32; TOP_LEVELS]) {
    let mut prices = [f32::NAN; TOP_LEVELS];
    let mut sizes = [f32::NAN; TOP_LEVELS];
    for (i, level) in levels.take(TOP_LEVELS).enumerate() {
        prices[i] = level.price as f32;
        sizes[i] = level.quantity as f32;
    }
    (prices, sizes)
}

/// Live books and their histories, keyed by snapshot timestamp
#[derive(Debug, Default)]
pub struct SessionSet {
    books: BTreeMap<i64, OrderBook>,
    histories: BTreeMap<i64, BookHistory>,
}

impl SessionSet {
    pub fn from_snapshots(snapshots: &BTreeMap<i64, Snapshot>) -> Self {
        let books = snapshots
            .iter()
            .map(|(ts, snapshot)| (*ts, OrderBook::from_snapshot(snapshot)))
            .collect();

        Self {
            books,
            histories: BTreeMap::new(),
        }
    }

    /// Offer `update` to every live book. Returns how many books accepted it.
    pub fn apply(&mut self, update: &PartialUpdate) -> usize {
        let mut accepted = 0;
        let mut dropped = Vec::new();

        for (book_id, book) in self.books.iter_mut() {
            match book.apply(update) {
                Ok(true) => {
                    accepted += 1;
                    let history = self.histories.entry(*book_id).or_default();
                    history.record(book);
                    if history.len() % PROGRESS_INTERVAL == 0 {
                        info!("Processed {} orderbook updates for {}.", history.len(), book_id);
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to update orderbook-{}: {}.", book_id, e);
                    dropped.push(*book_id);
                }
            }
        }

        for book_id in dropped {
            self.books.remove(&book_id);
        }
        accepted
    }

    pub fn live_books(&self) -> usize {
        self.books.len()
    }

    pub fn history(&self, book_id: i64) -> Option<&BookHistory> {
        self.histories.get(&book_id)
    }

    /// Histories of every book that accepted at least one update
    pub fn into_histories(self) -> BTreeMap<i64, BookHistory> {
        self.histories
    }
}

/// Output file for the session seeded at `timestamp` (UTC seconds)
pub fn session_file_name(timestamp: i64) -> Result<String> {
    let ts = DateTime::from_timestamp(timestamp, 0)
        .context(format!("Snapshot timestamp out of range: {}", timestamp))?;
    Ok(format!("{}.parquet", ts.format(FILE_TS_FORMAT)))
}

/// Export one daily archive into `out_dir`. Returns the files written.
pub fn export_archive(tar_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let reader = ArchiveReader::new(tar_path);
    let snapshots = reader.snapshots()?;

    let mut sessions = SessionSet::from_snapshots(&snapshots);
    drop(snapshots);

    reader.for_each_update(|update| {
        sessions.apply(&update);
        Ok(())
    })?;
    info!("{} orderbooks still in sync at end of archive", sessions.live_books());

    let mut written = Vec::new();
    for (book_id, history) in sessions.into_histories() {
        let path = out_dir.join(session_file_name(book_id)?);
        write_book_history(&path, &history)
            .context(format!("Failed to export orderbook-{}", book_id))?;
        written.push(path);
    }

    info!("Exported {} sessions from {:?} to {:?}", written.len(), tar_path, out_dir);
    Ok(written)
}
