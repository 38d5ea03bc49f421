//! Execution records
//!
//! These are what a run hands back: one `CmdResult` per external invocation,
//! paired per stage, accumulated per pipeline. Field tags follow the interchange
//! format consumed by error handler images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::Status;

/// Captured record of one external process invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdResult {
    /// Text fed to the process on standard input
    pub stdin: String,
    pub stdout: String,
    pub stderr: String,
    /// Command line that was executed
    pub cmd: String,
    /// Working directory of the process
    #[serde(rename = "cmdDir")]
    pub cmd_dir: String,
    /// Exit status; negative values mean no exit code was observed
    #[serde(rename = "status")]
    pub exit_status: i32,
    /// Environment visible to the process, as `KEY=VALUE`
    pub env: Vec<String>,
}

impl CmdResult {
    /// True for the unpopulated half of a stage that failed before reaching it
    pub fn is_empty(&self) -> bool {
        self.cmd.is_empty()
    }
}

/// Build and run outcome of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExecutionResult {
    pub stage: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(rename = "buildResult")]
    pub build_result: CmdResult,
    #[serde(rename = "runResult")]
    pub run_result: CmdResult,
}

impl StageExecutionResult {
    /// Opens a record for a stage starting now
    pub fn begin(stage: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            stage: stage.into(),
            start: now,
            end: now,
            build_result: CmdResult::default(),
            run_result: CmdResult::default(),
        }
    }

    /// Stamps the end time
    pub fn finish(&mut self) {
        self.end = Utc::now();
    }
}

/// Accumulated outcome of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub name: String,
    #[serde(rename = "stageResult")]
    pub stage_results: Vec<StageExecutionResult>,
    pub start: DateTime<Utc>,
    #[serde(rename = "final")]
    pub end: DateTime<Utc>,
    pub status: Status,
}

impl PipelineResult {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}
