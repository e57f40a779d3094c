//! Typed subprocess execution.
//!
//! Every external media tool (`ffprobe`, `ffmpeg`) is invoked through [`CommandRunner`] so the
//! pipeline can be exercised against a scripted runner in tests and so that every invocation
//! shares the same timeout and cancellation behavior.

use std::ffi::{OsStr, OsString};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::foundation::error::{LipsyncError, LipsyncResult};

/// One subprocess invocation: program, arguments and an optional wall-clock budget.
#[derive(Clone, Debug)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments as lossy UTF-8, for logging and for scripted runners.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// Captured result of a finished subprocess.
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion and capture its output.
    ///
    /// Returns `Err` only when the process could not be started or exceeded its timeout; a
    /// non-zero exit status is reported through [`CommandOutput::code`].
    async fn run(&self, spec: &CommandSpec) -> LipsyncResult<CommandOutput>;
}

/// Runs commands as real child processes via tokio.
///
/// Children are spawned with `kill_on_drop`, so a cancelled request (dropped future) or an
/// exceeded timeout also terminates the child.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    #[tracing::instrument(level = "debug", skip_all, fields(program = %spec.program))]
    async fn run(&self, spec: &CommandSpec) -> LipsyncResult<CommandOutput> {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(args = ?spec.args_lossy(), "spawning subprocess");
        let child = cmd.spawn().map_err(|e| {
            LipsyncError::media(format!(
                "failed to spawn {} (is it installed and on PATH?): {e}",
                spec.program
            ))
        })?;

        let wait = child.wait_with_output();
        let output = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                LipsyncError::media(format!(
                    "{} timed out after {:.1}s",
                    spec.program,
                    limit.as_secs_f64()
                ))
            })?,
            None => wait.await,
        }
        .map_err(|e| LipsyncError::media(format!("failed to wait for {}: {e}", spec.program)))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Return `true` when `program -version` can be invoked from `PATH`.
pub fn is_tool_on_path(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
