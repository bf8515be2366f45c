//! External tool invocation.
//!
//! Every cloud-side action goes through a [`CommandRunner`]: the real runner
//! spawns processes with `tokio::process`, tests substitute scripted runners.

use crate::error::ToolError;
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// A fully-assembled tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the child only; the parent environment is untouched.
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// True if any argument equals `arg` exactly.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of a finished invocation, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }

    /// Non-empty stdout lines.
    pub fn lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs tool commands bound to a cancellation token.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and return the raw output, whatever the exit status.
    ///
    /// Returns `ToolError::Cancelled` if `cancel` fires before or during the run.
    async fn run(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ToolError>;
}

/// Run a command and turn a non-zero exit into `ToolError::Failed`.
pub async fn run_checked(
    runner: &dyn CommandRunner,
    command: &ToolCommand,
    cancel: &CancellationToken,
) -> Result<CommandOutput, ToolError> {
    let output = runner.run(command, cancel).await?;
    if output.is_success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            command: command.to_string(),
            status: output.status,
            output: output.combined(),
        })
    }
}

/// Runner that spawns real processes.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                command: command.to_string(),
            });
        }

        debug!(command = %command, "Executing");
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on cancellation kills the child.
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| ToolError::Spawn {
            command: command.to_string(),
            source,
        })?;

        tokio::select! {
            output = child.wait_with_output() => {
                let output = CommandOutput::from(output.map_err(|source| ToolError::Spawn {
                    command: command.to_string(),
                    source,
                })?);
                trace!(command = %command, status = ?output.status, output = %output.combined(), "Finished");
                Ok(output)
            }
            _ = cancel.cancelled() => {
                debug!(command = %command, "Cancelled, killing child process");
                Err(ToolError::Cancelled { command: command.to_string() })
            }
        }
    }
}
