//! Remote sync driver
//!
//! Pulls `*.tar.gz` archives from `<REMOTE>:<remote_dir>` into the local
//! archive directory with a single rsync run. The SSH transport reaches the
//! remote through a local SOCKS proxy (`nc -X 5 -x host:port` as the
//! ProxyCommand). Integrity is left to rsync; the exit code is passed through
//! untouched.

use anyhow::{Context, Result};
use std::fs;
use tracing::info;

use crate::config::{SyncConfig, ARCHIVE_EXTENSION};
use crate::process_runner::{CommandSpec, ProcessRunner};

pub struct SyncDriver<R> {
    config: SyncConfig,
    runner: R,
    dry_run: bool,
}

impl<R: ProcessRunner> SyncDriver<R> {
    pub fn new(config: SyncConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            dry_run: false,
        }
    }

    /// Ask rsync to only report what it would transfer
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// `ssh` invocation tunnelled through the SOCKS proxy
    pub fn ssh_command(&self) -> String {
        format!(
            "ssh -o ProxyCommand='nc -X 5 -x {}:{} %h %p'",
            self.config.proxy_host, self.config.proxy_port
        )
    }

    /// The rsync command line for `remote`
    pub fn command_for(&self, remote: &str) -> CommandSpec {
        let mut command = CommandSpec::new(&self.config.program)
            .args(["-av", "--progress"])
            .arg(format!("--include=*{}", ARCHIVE_EXTENSION))
            .arg("--exclude=*");

        if self.dry_run {
            command = command.arg("--dry-run");
        }

        command
            .arg("-e")
            .arg(self.ssh_command())
            .arg(self.config.remote_source(remote))
            .arg(self.config.local_dir().to_string_lossy().into_owned())
            .inherit_output()
    }

    /// Validate `remote` and mirror. A missing remote fails before any
    /// directory is created or any process is spawned.
    pub async fn sync(&self, remote: Option<&str>) -> Result<i32> {
        let remote = SyncConfig::resolve_remote(remote)?;
        self.run(&remote).await
    }

    /// Run the mirror and return the exit code to propagate.
    ///
    /// The destination directory is created before rsync starts.
    pub async fn run(&self, remote: &str) -> Result<i32> {
        let local_dir = self.config.local_dir();
        fs::create_dir_all(&local_dir)
            .context(format!("Failed to create directory: {:?}", local_dir))?;

        let command = self.command_for(remote);
        info!("Syncing {} -> {:?}", self.config.remote_source(remote), local_dir);
        info!("Running: {}", command.display());

        let output = self.runner.run(&command).await?;
        info!("{} exited with {:?}", self.config.program, output.status);

        Ok(output.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::process_runner::testing::FakeRunner;
    use crate::process_runner::OutputMode;
    use tempfile::tempdir;

    fn test_config(root: &std::path::Path) -> SyncConfig {
        SyncConfig {
            archive_root: root.join("archive"),
            ..Default::default()
        }
    }

    #[test]
    fn test_ssh_command_uses_socks_proxy() {
        let driver = SyncDriver::new(SyncConfig::default(), FakeRunner::exiting_with(0));
        assert_eq!(
            driver.ssh_command(),
            "ssh -o ProxyCommand='nc -X 5 -x 127.0.0.1:1080 %h %p'"
        );
    }

    #[tokio::test]
    async fn test_single_invocation_with_filters() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let local_dir = config.local_dir();
        assert!(!local_dir.exists());

        let driver = SyncDriver::new(config, FakeRunner::exiting_with(0));
        let code = driver.sync(Some("root@10.0.0.2")).await.unwrap();
        assert_eq!(code, 0);
        assert!(local_dir.is_dir());

        let calls = driver.runner().calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.program, "rsync");
        assert_eq!(call.output, OutputMode::Inherit);
        assert!(call.args.contains(&"-av".to_string()));
        assert!(call.args.contains(&"--progress".to_string()));
        assert!(!call.args.contains(&"--dry-run".to_string()));

        let include = call.args.iter().position(|a| a == "--include=*.tar.gz").unwrap();
        let exclude = call.args.iter().position(|a| a == "--exclude=*").unwrap();
        assert!(include < exclude);

        let n = call.args.len();
        assert_eq!(call.args[n - 2], "root@10.0.0.2:/root/data/binance_data/");
        assert_eq!(call.args[n - 1], local_dir.to_string_lossy());
    }

    #[tokio::test]
    async fn test_exit_code_is_propagated() {
        let dir = tempdir().unwrap();
        let driver = SyncDriver::new(test_config(dir.path()), FakeRunner::exiting_with(23))
            .dry_run(true);

        assert_eq!(driver.run("root@host").await.unwrap(), 23);
        assert!(driver.runner().calls()[0].args.contains(&"--dry-run".to_string()));
    }

    #[tokio::test]
    async fn test_missing_remote_runs_nothing() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let local_dir = config.local_dir();
        let driver = SyncDriver::new(config, FakeRunner::exiting_with(0));

        let err = driver.sync(None).await.unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::MissingRemote));
        assert!(driver.sync(Some("")).await.is_err());

        assert!(driver.runner().calls().is_empty());
        assert!(!local_dir.exists());
    }
}
