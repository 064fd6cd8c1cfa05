//! Exporter driver
//!
//! Runs the exporter once per date, strictly one after another, and records
//! a completed/failed line per date in the run log. A failing date never
//! stops the batch; the caller decides what the aggregate result means.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::ExportConfig;
use crate::dates::DateToken;
use crate::process_runner::{CommandSpec, ProcessRunner};
use crate::run_log::RunLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOutcome {
    Completed,
    Failed,
}

impl DateOutcome {
    fn as_str(self) -> &'static str {
        match self {
            DateOutcome::Completed => "completed",
            DateOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DateReport {
    pub date: DateToken,
    pub outcome: DateOutcome,
    /// Exporter exit code, `None` if it never started or was killed
    pub exit_code: Option<i32>,
}

/// Per-date results of one driver run
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub reports: Vec<DateReport>,
}

impl ExportSummary {
    pub fn completed(&self) -> usize {
        self.count(DateOutcome::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(DateOutcome::Failed)
    }

    fn count(&self, outcome: DateOutcome) -> usize {
        self.reports.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Process exit status for the run. Per-date failures only count in
    /// strict mode.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if strict && self.failed() > 0 {
            1
        } else {
            0
        }
    }
}

pub fn exporting_message(date: &DateToken) -> String {
    format!("Exporting data for date: {}...", date)
}

pub fn outcome_message(date: &DateToken, outcome: DateOutcome) -> String {
    format!("Exporting data for date: {} {}.", date, outcome.as_str())
}

pub struct ExportDriver<R> {
    config: ExportConfig,
    runner: R,
    progress: ProgressBar,
}

impl<R: ProcessRunner> ExportDriver<R> {
    pub fn new(config: ExportConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            progress: ProgressBar::hidden(),
        }
    }

    /// Show a progress bar over the date list on the terminal
    pub fn with_progress_bar(mut self) -> Result<Self> {
        let progress_bar = ProgressBar::new(0);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} dates - {msg}")?
                .progress_chars("█▓▒░  "),
        );
        self.progress = progress_bar;
        Ok(self)
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Exporter invocation for one date
    pub fn command_for(&self, date: &DateToken) -> CommandSpec {
        let exporter = &self.config.exporter;
        CommandSpec::new(&exporter.program)
            .args(exporter.args.iter().cloned())
            .arg(format!("--tar_file_path={}", display_path(&self.config.archive_path(date))))
            .arg(format!("--out_dir={}", display_path(&self.config.out_dir())))
    }

    /// Export every date in order. Only log file problems produce an `Err`.
    pub async fn run(&self, dates: &[DateToken]) -> Result<ExportSummary> {
        let mut log = RunLog::create(&self.config.log_dir, &self.config.name)?;
        info!("Writing run log to {:?}", log.out_path());

        self.progress.set_length(dates.len() as u64);
        let mut summary = ExportSummary::default();

        for date in dates {
            self.progress.set_message(date.to_string());
            log.message(&exporting_message(date))?;

            let command = self.command_for(date);
            info!("Exporting {}: {}", date, command.display());

            let (outcome, exit_code) = match self.runner.run(&command).await {
                Ok(output) => {
                    log.capture(&output.combined_output())?;
                    if output.success() {
                        (DateOutcome::Completed, output.status)
                    } else {
                        warn!("Exporter exited with {:?} for {}", output.status, date);
                        (DateOutcome::Failed, output.status)
                    }
                }
                Err(e) => {
                    error!("Failed to start exporter for {}: {:#}", date, e);
                    log.capture(format!("{:#}\n", e).as_bytes())?;
                    (DateOutcome::Failed, None)
                }
            };

            log.message(&outcome_message(date, outcome))?;
            summary.reports.push(DateReport {
                date: date.clone(),
                outcome,
                exit_code,
            });
            self.progress.inc(1);
        }

        self.progress.finish_and_clear();
        info!(
            "Export run finished: {} completed, {} failed",
            summary.completed(),
            summary.failed()
        );
        Ok(summary)
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
