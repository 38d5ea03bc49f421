//! Container engine process management
//!
//! Every interaction with the container engine (build, run, volume create/rm)
//! goes through a `CommandRunner`:
//! - `ProcessRunner` spawns the real engine binary via tokio
//! - tests substitute a scripted runner
//!
//! The runner owns process-level concerns only: spawning, feeding stdin,
//! collecting output, enforcing the timeout and reacting to cancellation.

use async_trait::async_trait;
use relay_core::SIGNALLED;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::error::ExecError;

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`
    pub dir: Option<PathBuf>,
    /// Text written to the process's standard input; stdin is null when `None`
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            dir: None,
            stdin: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Program and arguments joined by single spaces
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output of a process that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or `SIGNALLED` when the process was killed by a signal
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes external commands
///
/// `Ok` means the process started and exited, whatever its exit code.
/// `Err` means no exit status was observed.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, ExecError>;
}

/// Runs commands as local child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a runner; `timeout` bounds each invocation when set
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput, ExecError> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }

        debug!("$ {}", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout or cancellation kills the child.
            .kill_on_drop(true);

        if let Some(dir) = &invocation.dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(ExecError::Spawn)?;

        let stdin = child.stdin.take();
        let input = invocation.stdin.clone().unwrap_or_default();
        let feed = async move {
            if let Some(mut pipe) = stdin {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                    debug!("Process closed stdin before reading all input");
                }
            }
            Ok(())
        };

        let collect = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            if let Err(e) = fed {
                return Err(ExecError::Io(e));
            }
            output.map_err(ExecError::Io)
        };

        let bounded = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, collect).await {
                    Ok(result) => result,
                    Err(_) => Err(ExecError::TimedOut(limit)),
                },
                None => collect.await,
            }
        };

        let output = tokio::select! {
            result = bounded => result?,
            _ = cancel.cancelled() => return Err(ExecError::Cancelled),
        };

        let output = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(SIGNALLED),
        };

        debug!(
            "Command exited: exit_code={}, stdout_len={}, stderr_len={}",
            output.exit_code,
            output.stdout.len(),
            output.stderr.len()
        );

        Ok(output)
    }
}

/// Checks that the engine binary is installed and answers `--version`
pub async fn check_engine_available(
    runner: &dyn CommandRunner,
    engine: &str,
) -> Result<String, ExecError> {
    let invocation = Invocation::new(engine, ["--version"]);
    let output = runner.execute(&invocation, &CancelToken::new()).await?;

    if !output.success() {
        return Err(ExecError::Io(std::io::Error::other(format!(
            "'{} --version' exited with status {}: {}",
            engine,
            output.exit_code,
            output.stderr.trim()
        ))));
    }

    let version = output.stdout.trim().to_string();
    info!("Container engine is available: {}", version);
    Ok(version)
}
