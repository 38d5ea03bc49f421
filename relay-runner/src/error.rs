//! Error types for the Relay runner

use relay_core::{CmdResult, Phase, PipelineResult, Status, ValidationError};
use std::time::Duration;
use thiserror::Error;

/// An external process that could not be started or did not run to completion
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program (or its working directory) could not be spawned
    #[error("command was not executed correctly: {0}")]
    Spawn(#[source] std::io::Error),

    /// The process started but its output could not be collected
    #[error("failed to collect process output: {0}")]
    Io(#[source] std::io::Error),

    #[error("command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("command cancelled")]
    Cancelled,
}

/// A build or run invocation that never produced an exit status
///
/// `result` holds the sentinel exit status and the command line, nothing else.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct InvocationError {
    pub result: CmdResult,
    #[source]
    pub source: ExecError,
}

/// Failures creating or removing the shared volume
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("error removing existing output folder {path}: {source}")]
    RemoveOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error creating output folder {path}: {source}")]
    CreateOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error creating volume {name}: {reason}")]
    Create { name: String, reason: String },

    #[error("error removing volume {name}: {reason}")]
    Remove { name: String, reason: String },
}

/// Why a stage's build or run step failed
#[derive(Debug, Error)]
pub enum StepError {
    /// The engine command could not be started or was interrupted
    #[error("{source} ({id})")]
    NotExecuted {
        id: String,
        #[source]
        source: ExecError,
    },

    /// The engine command ran and exited with a non-OK status
    #[error("status code {exit_code}({status}) in {phase} step for {id}")]
    ExitStatus {
        id: String,
        phase: Phase,
        exit_code: i32,
        status: Status,
    },
}

impl StepError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            StepError::NotExecuted {
                source: ExecError::Cancelled,
                ..
            }
        )
    }
}

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline definition: {0}")]
    Invalid(#[from] ValidationError),

    #[error("error in initial setup: {0}")]
    Setup(#[source] VolumeError),

    #[error("error in tear down: {0}")]
    Teardown(#[source] VolumeError),

    #[error("error when building image: {0}")]
    Build(#[source] StepError),

    #[error("error when running image: {0}")]
    Run(#[source] StepError),

    #[error("error when building image for error handler: {0}")]
    HandlerBuild(#[source] StepError),

    #[error("error when running image for error handler: {0}")]
    HandlerRun(#[source] StepError),

    #[error("error encoding stage result for error handler: {0}")]
    HandlerInput(#[source] serde_json::Error),
}

impl PipelineError {
    /// Classification reported in the pipeline result
    pub fn status(&self) -> Status {
        match self {
            PipelineError::Invalid(_) | PipelineError::Setup(_) | PipelineError::Teardown(_) => {
                Status::SetupError
            }
            PipelineError::Build(_) => Status::BuildError,
            PipelineError::Run(_) => Status::RunError,
            PipelineError::HandlerBuild(_)
            | PipelineError::HandlerRun(_)
            | PipelineError::HandlerInput(_) => Status::ErrorHandlerError,
        }
    }

    /// True when the failing step was interrupted by cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            PipelineError::Build(step)
            | PipelineError::Run(step)
            | PipelineError::HandlerBuild(step)
            | PipelineError::HandlerRun(step) => step.is_cancelled(),
            _ => false,
        }
    }
}

/// A failed run, together with everything recorded up to the failure
#[derive(Debug, Error)]
#[error("pipeline '{}' failed: {error}", .result.name)]
pub struct PipelineFailure {
    pub result: PipelineResult,
    #[source]
    pub error: PipelineError,
}

impl PipelineFailure {
    pub fn status(&self) -> Status {
        self.result.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let step = || StepError::ExitStatus {
            id: "release/collect".to_string(),
            phase: Phase::Build,
            exit_code: 3,
            status: Status::BuildError,
        };

        assert_eq!(PipelineError::Build(step()).status(), Status::BuildError);
        assert_eq!(PipelineError::Run(step()).status(), Status::RunError);
        assert_eq!(
            PipelineError::HandlerBuild(step()).status(),
            Status::ErrorHandlerError
        );
        assert_eq!(
            PipelineError::Invalid(ValidationError::EmptyName).status(),
            Status::SetupError
        );
        assert_eq!(
            PipelineError::Teardown(VolumeError::Remove {
                name: "v".to_string(),
                reason: "busy".to_string()
            })
            .status(),
            Status::SetupError
        );
    }

    #[test]
    fn test_exit_status_message_names_stage_and_code() {
        let err = PipelineError::Build(StepError::ExitStatus {
            id: "release/collect".to_string(),
            phase: Phase::Build,
            exit_code: 3,
            status: Status::BuildError,
        });

        let message = err.to_string();
        assert!(message.starts_with("error when building image"));
        assert!(message.contains("release/collect"));
        assert!(message.contains("status code 3(BuildError)"));
    }

    #[test]
    fn test_cancellation_detection() {
        let cancelled = PipelineError::Run(StepError::NotExecuted {
            id: "release/collect".to_string(),
            source: ExecError::Cancelled,
        });
        assert!(cancelled.is_cancelled());

        let timed_out = PipelineError::Run(StepError::NotExecuted {
            id: "release/collect".to_string(),
            source: ExecError::TimedOut(Duration::from_secs(1)),
        });
        assert!(!timed_out.is_cancelled());
    }
}
