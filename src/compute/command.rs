//! Runs provider CLIs (`aws`) as child processes and decodes their JSON output.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::error::{BackendError, BackendResult};

const CMD_TIMEOUT: Duration = Duration::from_secs(120);
const CMD_RETRIES: usize = 3;
const CMD_RETRY_BACKOFF: Duration = Duration::from_millis(750);

/// Whether a command may be retried after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Read-only; safe to repeat.
    Query,
    /// Changes cloud state; run exactly once.
    Mutation,
}

/// A provider CLI with a fixed environment.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
    envs: Vec<(String, String)>,
    timeout: Duration,
    retries: usize,
    retry_backoff: Duration,
}

impl CommandRunner {
    /// Creates a runner for `program` (resolved from `PATH`).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            envs: Vec::new(),
            timeout: CMD_TIMEOUT,
            retries: CMD_RETRIES,
            retry_backoff: CMD_RETRY_BACKOFF,
        }
    }

    /// Adds an environment variable to every invocation.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Overrides the per-invocation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the attempt count and delay used for [`CommandKind::Query`].
    pub fn retries(mut self, retries: usize, backoff: Duration) -> Self {
        self.retries = retries.max(1);
        self.retry_backoff = backoff;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs the command and deserializes its stdout.
    pub async fn run_json<T: DeserializeOwned>(
        &self,
        args: &[String],
        label: &str,
        kind: CommandKind,
    ) -> BackendResult<T> {
        let stdout = self.run(args, label, kind).await?;
        serde_json::from_slice(&stdout).map_err(|e| BackendError::Parse {
            what: "command output",
            message: format!("{label}: {e}"),
        })
    }

    /// Runs the command and returns its stdout.
    pub async fn run(
        &self,
        args: &[String],
        label: &str,
        kind: CommandKind,
    ) -> BackendResult<Vec<u8>> {
        let attempts = match kind {
            CommandKind::Query => self.retries,
            CommandKind::Mutation => 1,
        };

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            tracing::debug!(program = %self.program.display(), label, attempt, "running command");

            match self.run_once(args, label).await {
                Ok(stdout) => return Ok(stdout),
                Err(e) if attempt >= attempts || is_not_found(&e) => return Err(e),
                Err(e) => {
                    tracing::warn!(label, attempt, error = %e, "command failed, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }

    async fn run_once(&self, args: &[String], label: &str) -> BackendResult<Vec<u8>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| BackendError::Spawn {
            program: self.program.display().to_string(),
            source: e,
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(|e| BackendError::CommandFailed {
                label: label.to_string(),
                stderr: format!("failed waiting for process: {e}"),
            })?,
            Err(_) => {
                return Err(BackendError::CommandTimedOut {
                    label: label.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        if output.status.success() {
            return Ok(output.stdout);
        }

        Err(BackendError::CommandFailed {
            label: label.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Not-found answers will not change on retry.
fn is_not_found(err: &BackendError) -> bool {
    matches!(err, BackendError::CommandFailed { stderr, .. } if stderr.contains("NotFound"))
}
