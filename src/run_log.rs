//! Plain-text run logs of the exporter driver
//!
//! One run owns two files, `<log_dir>/<name>_export.log` for the driver's own
//! messages and `<log_dir>/<name>_export.err` for whatever the exporter
//! printed. Both are truncated when the run starts, never appended to.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct RunLog {
    out: File,
    err: File,
    out_path: PathBuf,
    err_path: PathBuf,
}

impl RunLog {
    /// Paths of the message log and the captured-output log
    pub fn paths(log_dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        (
            log_dir.join(format!("{}_export.log", name)),
            log_dir.join(format!("{}_export.err", name)),
        )
    }

    /// Create the log directory if needed and truncate both files
    pub fn create(log_dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .context(format!("Failed to create log directory: {:?}", log_dir))?;

        let (out_path, err_path) = Self::paths(log_dir, name);
        let out = File::create(&out_path)
            .context(format!("Failed to open log file: {:?}", out_path))?;
        let err = File::create(&err_path)
            .context(format!("Failed to open log file: {:?}", err_path))?;

        Ok(Self { out, err, out_path, err_path })
    }

    /// Append one message line
    pub fn message(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line)
            .context(format!("Failed to write to {:?}", self.out_path))
    }

    /// Append raw exporter output
    pub fn capture(&mut self, output: &[u8]) -> Result<()> {
        self.err
            .write_all(output)
            .context(format!("Failed to write to {:?}", self.err_path))
    }

    pub fn out_path(&self) -> &Path {
        &self.out_path
    }

    pub fn err_path(&self) -> &Path {
        &self.err_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_creates_missing_log_dir() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("log");

        let log = RunLog::create(&log_dir, "binance").unwrap();
        assert!(log_dir.is_dir());
        assert_eq!(log.out_path(), log_dir.join("binance_export.log"));
        assert_eq!(log.err_path(), log_dir.join("binance_export.err"));
    }

    #[test]
    fn test_second_run_truncates() {
        let dir = tempdir().unwrap();

        {
            let mut log = RunLog::create(dir.path(), "binance").unwrap();
            log.message("first run, a fairly long line").unwrap();
            log.capture(b"first run output\n").unwrap();
        }
        {
            let mut log = RunLog::create(dir.path(), "binance").unwrap();
            log.message("second").unwrap();
        }

        let (out_path, err_path) = RunLog::paths(dir.path(), "binance");
        assert_eq!(fs::read_to_string(out_path).unwrap(), "second\n");
        assert_eq!(fs::read_to_string(err_path).unwrap(), "");
    }
}
