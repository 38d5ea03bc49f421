//! Pipeline status taxonomy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit status recorded when a process could not be started or did not run to completion
pub const NOT_STARTED: i32 = -2;

/// Exit status recorded when a process was terminated by a signal
pub const SIGNALLED: i32 = -1;

/// Terminal classification of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    SetupError,
    BuildError,
    RunError,
    ErrorHandlerError,
}

impl Status {
    /// Human-readable text, also the serialized form
    pub fn text(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::SetupError => "SetupError",
            Status::BuildError => "BuildError",
            Status::RunError => "RunError",
            Status::ErrorHandlerError => "ErrorHandlerError",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Half of a stage: building its image or running it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Build,
    Run,
}

impl Phase {
    /// Status reported when this phase fails
    pub fn failure(&self) -> Status {
        match self {
            Phase::Build => Status::BuildError,
            Phase::Run => Status::RunError,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Build => f.write_str("build"),
            Phase::Run => f.write_str("run"),
        }
    }
}

/// Classifies a process exit status observed in the given phase
pub fn classify(exit_code: i32, phase: Phase) -> Status {
    if exit_code == 0 {
        Status::Ok
    } else {
        phase.failure()
    }
}
