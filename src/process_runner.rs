//! External command execution
//!
//! Both drivers only ever talk to the outside world by spawning a program
//! and waiting for it. The `ProcessRunner` trait is that boundary; the
//! production implementation uses `tokio::process`, tests substitute a fake.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// What happens to the child's stdout/stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Collect both streams and hand them back to the caller
    #[default]
    Capture,
    /// Let the child write straight to our terminal
    Inherit,
}

/// A program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub output: OutputMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: OutputMode::Capture,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    /// Shell-like rendering for log messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of one finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the child was killed by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn with_status(code: i32) -> Self {
        Self {
            status: Some(code),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Exit code to propagate; signal termination maps to 1
    pub fn exit_code(&self) -> i32 {
        self.status.unwrap_or(1)
    }

    /// stdout followed by stderr
    pub fn combined_output(&self) -> Vec<u8> {
        let mut combined = Vec::with_capacity(self.stdout.len() + self.stderr.len());
        combined.extend_from_slice(&self.stdout);
        combined.extend_from_slice(&self.stderr);
        combined
    }
}

/// Runs a command to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Spawn `command` and wait for it. An `Err` means the program could not
    /// be started at all; a non-zero exit is reported through `ProcessOutput`.
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput>;
}

/// Runner backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput> {
        debug!("Executing command: {}", command.display());

        let mut child = Command::new(&command.program);
        child.args(&command.args).stdin(Stdio::null());

        match command.output {
            OutputMode::Capture => {
                let output = child
                    .output()
                    .await
                    .context(format!("Failed to execute {}", command.program))?;

                Ok(ProcessOutput {
                    status: output.status.code(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            OutputMode::Inherit => {
                let status = child
                    .status()
                    .await
                    .context(format!("Failed to execute {}", command.program))?;

                Ok(ProcessOutput {
                    status: status.code(),
                    ..Default::default()
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    type Responder = Box<dyn Fn(&CommandSpec) -> Result<ProcessOutput> + Send + Sync>;

    /// Records every command and answers with a scripted result
    pub struct FakeRunner {
        calls: Mutex<Vec<CommandSpec>>,
        responder: Responder,
    }

    impl FakeRunner {
        pub fn new<F>(responder: F) -> Self
        where
            F: Fn(&CommandSpec) -> Result<ProcessOutput> + Send + Sync + 'static,
        {
            Self {
                calls: Mutex::new(Vec::new()),
                responder: Box::new(responder),
            }
        }

        /// Every command exits with `code`
        pub fn exiting_with(code: i32) -> Self {
            Self::new(move |_| Ok(ProcessOutput::with_status(code)))
        }

        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput> {
            self.calls.lock().unwrap().push(command.clone());
            (self.responder)(command)
        }
    }
}
