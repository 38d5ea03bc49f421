//! Image build and run executors
//!
//! Translates a stage into the container engine's CLI contract:
//!
//! ```text
//! <engine> build [--build-arg KEY=VALUE]... -t <tag> .
//! <engine> run -i -v <volume>:/output --rm [--env KEY=VALUE]... <tag>
//! ```
//!
//! Both run with the stage directory as working directory. Flags are emitted in
//! key order so identical configurations give identical command lines.

use relay_core::{CmdResult, NOT_STARTED, Phase, classify, image_tag};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::engine::{CommandRunner, Invocation};
use crate::error::{InvocationError, StepError};
use crate::volume::SharedVolume;

/// Mount point of the shared volume inside every stage container
pub const OUTPUT_MOUNT: &str = "/output";

/// Builds and runs stage images through a container engine
#[derive(Clone)]
pub struct ImageExecutor {
    runner: Arc<dyn CommandRunner>,
    engine: String,
}

impl ImageExecutor {
    /// Creates an executor
    ///
    /// # Arguments
    /// * `runner` - Process runner used for every engine invocation
    /// * `engine` - Engine binary, e.g. `docker` or `podman`
    pub fn new(runner: Arc<dyn CommandRunner>, engine: impl Into<String>) -> Self {
        Self {
            runner,
            engine: engine.into(),
        }
    }

    /// Builds the image for a stage directory
    ///
    /// A non-zero exit is still `Ok`; the caller classifies `exit_status`.
    pub async fn build(
        &self,
        id: &str,
        dir: &Path,
        build_env: &BTreeMap<String, String>,
        cancel: &CancelToken,
    ) -> Result<CmdResult, InvocationError> {
        info!("Building image for {}", id);

        let invocation = Invocation::new(&self.engine, build_args(dir, build_env)).in_dir(dir);
        self.invoke(id, invocation, cancel).await
    }

    /// Runs the image built for a stage directory
    ///
    /// `input` is fed to the container's stdin and recorded verbatim.
    pub async fn run(
        &self,
        id: &str,
        dir: &Path,
        input: &str,
        run_env: &BTreeMap<String, String>,
        volume: &SharedVolume,
        cancel: &CancelToken,
    ) -> Result<CmdResult, InvocationError> {
        info!("Running image for {}", id);

        let invocation = Invocation::new(&self.engine, run_args(dir, run_env, volume))
            .in_dir(dir)
            .with_stdin(input);
        self.invoke(id, invocation, cancel).await
    }

    async fn invoke(
        &self,
        id: &str,
        invocation: Invocation,
        cancel: &CancelToken,
    ) -> Result<CmdResult, InvocationError> {
        let cmd = invocation.command_line();

        match self.runner.execute(&invocation, cancel).await {
            Ok(output) => Ok(CmdResult {
                stdin: invocation.stdin.unwrap_or_default(),
                stdout: output.stdout,
                stderr: output.stderr,
                cmd,
                cmd_dir: invocation
                    .dir
                    .map(|dir| dir.to_string_lossy().to_string())
                    .unwrap_or_default(),
                exit_status: output.exit_code,
                env: host_environment(),
            }),
            Err(source) => {
                warn!("Command for {} was not executed: {}", id, source);
                Err(InvocationError {
                    result: CmdResult {
                        cmd,
                        exit_status: NOT_STARTED,
                        ..Default::default()
                    },
                    source,
                })
            }
        }
    }
}

/// Stores an invocation's record in `slot` and classifies its outcome
///
/// Both failure shapes end up as a `StepError`: the invocation never produced an
/// exit status, or it exited with a status that doesn't classify as OK.
pub(crate) fn record_step(
    outcome: Result<CmdResult, InvocationError>,
    slot: &mut CmdResult,
    id: &str,
    phase: Phase,
) -> Result<(), StepError> {
    match outcome {
        Ok(result) => {
            let exit_code = result.exit_status;
            *slot = result;

            let status = classify(exit_code, phase);
            if status.is_ok() {
                Ok(())
            } else {
                Err(StepError::ExitStatus {
                    id: id.to_string(),
                    phase,
                    exit_code,
                    status,
                })
            }
        }
        Err(InvocationError { result, source }) => {
            *slot = result;
            Err(StepError::NotExecuted {
                id: id.to_string(),
                source,
            })
        }
    }
}

fn build_args(dir: &Path, build_env: &BTreeMap<String, String>) -> Vec<String> {
    let mut args = vec!["build".to_string()];
    for (key, value) in build_env {
        args.push("--build-arg".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.extend(["-t".to_string(), tag(dir), ".".to_string()]);
    args
}

fn run_args(
    dir: &Path,
    run_env: &BTreeMap<String, String>,
    volume: &SharedVolume,
) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-i".to_string(),
        "-v".to_string(),
        format!("{}:{}", volume.name, OUTPUT_MOUNT),
        "--rm".to_string(),
    ];
    for (key, value) in run_env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(tag(dir));
    args
}

fn tag(dir: &Path) -> String {
    image_tag(dir).unwrap_or_default().to_string()
}

/// Snapshot of the orchestrating process's environment as `KEY=VALUE`
fn host_environment() -> Vec<String> {
    std::env::vars_os()
        .map(|(k, v)| format!("{}={}", k.to_string_lossy(), v.to_string_lossy()))
        .collect()
}
