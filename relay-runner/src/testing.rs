//! Scripted command runner for tests

use async_trait::async_trait;
use std::sync::Mutex;

use crate::cancel::CancelToken;
use crate::engine::{CommandRunner, Invocation, ProcessOutput};
use crate::error::ExecError;

/// Canned response to one invocation
pub enum Reply {
    Exit(ProcessOutput),
    NotStarted,
    Cancelled,
}

impl Reply {
    pub fn exit(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Reply::Exit(ProcessOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
        })
    }

    pub fn ok(stdout: &str) -> Self {
        Self::exit(0, stdout, "")
    }
}

type Script = Box<dyn Fn(&Invocation) -> Reply + Send + Sync>;

/// Answers invocations from a closure and records every call
pub struct ScriptedRunner {
    script: Script,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new(script: impl Fn(&Invocation) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every engine call succeeds with empty output
    pub fn succeeding() -> Self {
        Self::new(|_| Reply::ok(""))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose first argument is `subcommand` (`build`, `run`, `volume`)
    pub fn calls_to(&self, subcommand: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| subcommand_of(inv) == Some(subcommand))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(
        &self,
        invocation: &Invocation,
        _cancel: &CancelToken,
    ) -> Result<ProcessOutput, ExecError> {
        self.calls.lock().unwrap().push(invocation.clone());

        match (self.script)(invocation) {
            Reply::Exit(output) => Ok(output),
            Reply::NotStarted => Err(ExecError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "engine binary not found",
            ))),
            Reply::Cancelled => Err(ExecError::Cancelled),
        }
    }
}

pub fn subcommand_of(invocation: &Invocation) -> Option<&str> {
    invocation.args.first().map(String::as_str)
}

/// Image tag an engine build or run invocation targets
pub fn tag_of(invocation: &Invocation) -> Option<&str> {
    match subcommand_of(invocation)? {
        "build" => invocation
            .args
            .iter()
            .position(|arg| arg == "-t")
            .and_then(|pos| invocation.args.get(pos + 1))
            .map(String::as_str),
        "run" => invocation.args.last().map(String::as_str),
        _ => None,
    }
}
