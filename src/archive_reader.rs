//! Daily archive reader
//!
//! A daily `.tar.gz` holds one member per depth snapshot
//! (`./binance.BTCUSDT@orderbook5000.<unix_seconds>`) and one member with
//! the diff-depth stream (`./btcusdt@depth@100ms`). Every record is
//! `<prefix>|<json>`. Gzip streams cannot seek, so the archive is read
//! twice: once to collect snapshots, once to stream the updates.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use thiserror::Error;
use tracing::{debug, info};

use crate::orderbook::{PartialUpdate, Snapshot};

pub const SNAPSHOT_PREFIX: &str = "binance.BTCUSDT@orderbook5000";
pub const DEPTH_STREAM: &str = "btcusdt@depth@100ms";
const DEPTH_EVENT: &str = "depthUpdate";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("member {0} not found in archive")]
    MissingMember(String),

    #[error("line {line} of {member} has no '|' separator")]
    MissingSeparator { member: String, line: usize },

    #[error("invalid snapshot timestamp in member {0}")]
    InvalidTimestamp(String),

    #[error("unexpected event type '{event}' on line {line} of {member}")]
    UnexpectedEvent { member: String, line: usize, event: String },
}

/// Envelope of one combined-stream record
#[derive(Debug, Deserialize)]
struct StreamRecord {
    data: DepthEvent,
}

#[derive(Debug, Deserialize)]
struct DepthEvent {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(flatten)]
    update: PartialUpdate,
}

/// Strip the recorder prefix from a `<prefix>|<json>` record
fn payload<'a>(record: &'a str, member: &str, line: usize) -> Result<&'a str, ArchiveError> {
    record
        .split_once('|')
        .map(|(_, json)| json)
        .ok_or_else(|| ArchiveError::MissingSeparator {
            member: member.to_string(),
            line,
        })
}

/// Parse one snapshot member body
pub fn parse_snapshot(body: &str, member: &str) -> Result<Snapshot> {
    let json = payload(body, member, 1)?;
    serde_json::from_str(json).context(format!("Failed to parse snapshot in {}", member))
}

/// Parse one line of the depth stream
pub fn parse_depth_line(record: &str, member: &str, line: usize) -> Result<PartialUpdate> {
    let json = payload(record, member, line)?;
    let parsed: StreamRecord = serde_json::from_str(json)
        .context(format!("Failed to parse line {} of {}", line, member))?;

    if parsed.data.event_type != DEPTH_EVENT {
        return Err(ArchiveError::UnexpectedEvent {
            member: member.to_string(),
            line,
            event: parsed.data.event_type,
        }
        .into());
    }
    Ok(parsed.data.update)
}

pub struct ArchiveReader {
    path: PathBuf,
    snapshot_prefix: String,
    depth_stream: String,
}

impl ArchiveReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            snapshot_prefix: SNAPSHOT_PREFIX.to_string(),
            depth_stream: DEPTH_STREAM.to_string(),
        }
    }

    /// Read a different symbol's streams
    pub fn with_streams(mut self, snapshot_prefix: &str, depth_stream: &str) -> Self {
        self.snapshot_prefix = snapshot_prefix.to_string();
        self.depth_stream = depth_stream.to_string();
        self
    }

    fn open(&self) -> Result<Archive<GzDecoder<File>>> {
        let file = File::open(&self.path)
            .context(format!("Failed to open archive: {:?}", self.path))?;
        Ok(Archive::new(GzDecoder::new(file)))
    }

    /// Timestamp suffix of a snapshot member, `None` for other members
    fn snapshot_timestamp(&self, name: &str) -> Option<Result<i64, ArchiveError>> {
        let rest = name.strip_prefix(self.snapshot_prefix.as_str())?;
        let ts = rest
            .strip_prefix('.')
            .and_then(|digits| digits.parse::<i64>().ok())
            .ok_or_else(|| ArchiveError::InvalidTimestamp(name.to_string()));
        Some(ts)
    }

    /// All snapshots keyed by their timestamp (seconds)
    pub fn snapshots(&self) -> Result<BTreeMap<i64, Snapshot>> {
        let mut archive = self.open()?;
        let mut snapshots = BTreeMap::new();

        for entry in archive.entries().context("Failed to read archive entries")? {
            let mut entry = entry.context("Failed to read archive entry")?;
            let name = member_name(&entry.path_bytes());

            let Some(timestamp) = self.snapshot_timestamp(&name) else {
                continue;
            };
            let timestamp = timestamp?;

            let mut body = String::new();
            entry
                .read_to_string(&mut body)
                .context(format!("Failed to extract {}", name))?;

            let snapshot = parse_snapshot(&body, &name)?;
            debug!("Loaded snapshot {} (lastUpdateId {})", timestamp, snapshot.last_update_id);
            snapshots.insert(timestamp, snapshot);
        }

        info!("Loaded {} snapshots from {:?}", snapshots.len(), self.path);
        Ok(snapshots)
    }

    /// Stream every depth update to `on_update`, in file order.
    /// Returns the number of updates read.
    pub fn for_each_update<F>(&self, mut on_update: F) -> Result<usize>
    where
        F: FnMut(PartialUpdate) -> Result<()>,
    {
        let mut archive = self.open()?;

        for entry in archive.entries().context("Failed to read archive entries")? {
            let entry = entry.context("Failed to read archive entry")?;
            let name = member_name(&entry.path_bytes());
            if name != self.depth_stream {
                continue;
            }

            let mut count = 0;
            for (idx, line) in BufReader::new(entry).lines().enumerate() {
                let line = line.context(format!("Failed to read {}", name))?;
                if line.trim().is_empty() {
                    continue;
                }
                on_update(parse_depth_line(&line, &name, idx + 1)?)?;
                count += 1;
            }

            info!("Read {} depth updates from {}", count, name);
            return Ok(count);
        }

        Err(ArchiveError::MissingMember(self.depth_stream.clone()).into())
    }
}

/// Member path without the leading `./`
fn member_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    name.strip_prefix("./").unwrap_or(&name).to_string()
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_depth_line() {
        let line = depth_line(10, 12, &[(100.0, 1.0)], &[]);
        let update = parse_depth_line(&line, DEPTH_STREAM, 1).unwrap();
        assert_eq!(update.first_update_id, 10);
        assert_eq!(update.last_update_id, 12);
        assert_eq!(update.bids.len(), 1);
        assert!(update.asks.is_empty());
    }

    #[test]
    fn test_rejects_other_events_and_bad_records() {
        let line = depth_line(1, 2, &[], &[]).replace("depthUpdate", "trade");
        let err = parse_depth_line(&line, DEPTH_STREAM, 7).unwrap_err();
        assert!(err.to_string().contains("unexpected event type 'trade' on line 7"));

        assert!(parse_depth_line("no separator", DEPTH_STREAM, 1).is_err());
        assert!(parse_snapshot("prefix|{not json", "snap").is_err());
    }

    #[test]
    fn test_reads_snapshots_and_updates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20250921.tar.gz");
        // Depth stream stored before the snapshots on purpose
        write_archive(
            &path,
            &[
                (
                    DEPTH_STREAM,
                    format!(
                        "{}\n{}\n\n",
                        depth_line(101, 102, &[(99.0, 1.0)], &[]),
                        depth_line(103, 103, &[], &[(101.0, 0.0)])
                    ),
                ),
                (
                    "binance.BTCUSDT@orderbook5000.1758412800",
                    snapshot_body(100, &[(99.5, 2.0)], &[(101.0, 1.0)]),
                ),
                (
                    "binance.BTCUSDT@orderbook5000.1758413100",
                    snapshot_body(102, &[(99.5, 2.0)], &[(101.0, 1.0)]),
                ),
                ("unrelated.txt", "ignored".to_string()),
            ],
        );

        let reader = ArchiveReader::new(&path);
        let snapshots = reader.snapshots().unwrap();
        assert_eq!(snapshots.keys().copied().collect::<Vec<_>>(), vec![1758412800, 1758413100]);
        assert_eq!(snapshots[&1758413100].last_update_id, 102);

        let mut ids = Vec::new();
        let count = reader
            .for_each_update(|update| {
                ids.push(update.last_update_id);
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(ids, vec![102, 103]);
    }

    #[test]
    fn test_missing_depth_stream() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.tar.gz");
        write_archive(&path, &[("unrelated.txt", "x".to_string())]);

        let err = ArchiveReader::new(&path).for_each_update(|_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("btcusdt@depth@100ms"));

        let err = ArchiveReader::new(&path)
            .with_streams("binance.ETHUSDT@orderbook5000", "ethusdt@depth@100ms")
            .for_each_update(|_| Ok(()))
            .unwrap_err();
        assert!(err.to_string().contains("ethusdt@depth@100ms"));
    }

    #[test]
    fn test_bad_snapshot_timestamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.tar.gz");
        write_archive(
            &path,
            &[("binance.BTCUSDT@orderbook5000.latest", snapshot_body(1, &[], &[]))],
        );

        assert!(ArchiveReader::new(&path).snapshots().is_err());
    }

    #[test]
    fn test_missing_archive_file() {
        let dir = tempdir().unwrap();
        assert!(ArchiveReader::new(dir.path().join("nope.tar.gz")).snapshots().is_err());
    }
}
