//! Configuration module for the archive drivers
//!
//! This module defines the directory layout shared by the sync and export
//! drivers, the exporter command line, and the proxied rsync transport.
//! Every field has a default, so an empty (or missing) YAML file yields the
//! stock layout.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::dates::DateToken;

/// Directory holding the Binance archives under both the archive and export roots
pub const DATA_SUBDIR: &str = "binance_data";

/// Extension of the daily archive files
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Name of the environment variable holding the remote endpoint
pub const REMOTE_ENV: &str = "REMOTE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("REMOTE is not set; export REMOTE=user@host or add it to .env")]
    MissingRemote,
}

/// External exporter program invoked once per date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExporterCommand {
    /// Program to execute (e.g. "binance-exporter" or "python")
    pub program: String,
    /// Arguments placed before the per-date flags (e.g. ["binance_exporter.py"])
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ExporterCommand {
    fn default() -> Self {
        Self {
            program: "binance-exporter".to_string(),
            args: Vec::new(),
        }
    }
}

/// Exporter driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Name used for the log files (log/<name>_export.log and .err)
    pub name: String,
    /// Base directory holding downloaded archives
    pub archive_root: PathBuf,
    /// Base directory receiving exporter output
    pub export_root: PathBuf,
    /// Directory for the run logs
    pub log_dir: PathBuf,
    pub exporter: ExporterCommand,
    /// Explicit date list; the built-in list is used when empty
    pub dates: Vec<DateToken>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            name: "binance".to_string(),
            archive_root: PathBuf::from("/data/archive"),
            export_root: PathBuf::from("/data/export"),
            log_dir: PathBuf::from("log"),
            exporter: ExporterCommand::default(),
            dates: Vec::new(),
        }
    }
}

impl ExportConfig {
    /// Directory the archives are read from
    pub fn data_dir(&self) -> PathBuf {
        self.archive_root.join(DATA_SUBDIR)
    }

    /// Directory the exporter writes into
    pub fn out_dir(&self) -> PathBuf {
        self.export_root.join(DATA_SUBDIR)
    }

    /// Archive path for one date (no existence check)
    pub fn archive_path(&self, date: &DateToken) -> PathBuf {
        self.data_dir().join(format!("{}{}", date, ARCHIVE_EXTENSION))
    }
}

/// Remote sync driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base directory receiving the mirrored archives
    pub archive_root: PathBuf,
    /// Source directory on the remote host
    pub remote_dir: String,
    /// Local SOCKS proxy used as the SSH ProxyCommand
    pub proxy_host: String,
    pub proxy_port: u16,
    /// Mirroring tool
    pub program: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            archive_root: PathBuf::from("/data/archive"),
            remote_dir: "/root/data/binance_data/".to_string(),
            proxy_host: "127.0.0.1".to_string(),
            proxy_port: 1080,
            program: "rsync".to_string(),
        }
    }
}

impl SyncConfig {
    /// Local destination directory for the mirror
    pub fn local_dir(&self) -> PathBuf {
        self.archive_root.join(DATA_SUBDIR)
    }

    /// Remote source in rsync's `host:path` form
    pub fn remote_source(&self, remote: &str) -> String {
        format!("{}:{}", remote, self.remote_dir)
    }

    /// Validate the remote endpoint; absent or blank values are fatal
    pub fn resolve_remote(remote: Option<&str>) -> Result<String, ConfigError> {
        match remote.map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(ConfigError::MissingRemote),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub export: ExportConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(content)
            .context("Failed to parse config YAML")?;

        Ok(config)
    }

    /// Load from an optional path, falling back to the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let yaml = r#"
export:
  name: "btc"
  archive_root: "/mnt/archive"
  export_root: "/mnt/export"
  exporter:
    program: "python"
    args: ["binance_exporter.py"]
  dates: ["20250920", "20250921"]

sync:
  archive_root: "/mnt/archive"
  proxy_port: 7890
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.export.name, "btc");
        assert_eq!(config.export.exporter.program, "python");
        assert_eq!(config.export.exporter.args, vec!["binance_exporter.py"]);
        assert_eq!(config.export.dates.len(), 2);
        assert_eq!(config.export.log_dir, PathBuf::from("log"));
        assert_eq!(config.sync.proxy_port, 7890);
        assert_eq!(config.sync.proxy_host, "127.0.0.1");
        assert_eq!(config.sync.remote_dir, "/root/data/binance_data/");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.export.name, "binance");
        assert_eq!(config.export.exporter, ExporterCommand::default());
        assert_eq!(config.sync.program, "rsync");
    }

    #[test]
    fn test_invalid_date_in_config_is_rejected() {
        let yaml = r#"
export:
  dates: ["2025-09-21"]
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_paths() {
        let config = ExportConfig {
            archive_root: PathBuf::from("/a"),
            export_root: PathBuf::from("/e"),
            ..Default::default()
        };
        let date: DateToken = "20250921".parse().unwrap();

        assert_eq!(config.data_dir(), PathBuf::from("/a/binance_data"));
        assert_eq!(config.out_dir(), PathBuf::from("/e/binance_data"));
        assert_eq!(
            config.archive_path(&date),
            PathBuf::from("/a/binance_data/20250921.tar.gz")
        );

        let sync = SyncConfig::default();
        assert_eq!(
            sync.remote_source("root@10.0.0.2"),
            "root@10.0.0.2:/root/data/binance_data/"
        );
    }

    #[test]
    fn test_resolve_remote() {
        assert_eq!(
            SyncConfig::resolve_remote(Some("root@host")),
            Ok("root@host".to_string())
        );
        assert_eq!(SyncConfig::resolve_remote(None), Err(ConfigError::MissingRemote));
        assert_eq!(SyncConfig::resolve_remote(Some("  ")), Err(ConfigError::MissingRemote));
    }
}
