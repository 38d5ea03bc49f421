//! Relay Runner
//!
//! Executes pipelines of container stages through a container engine CLI
//! (`docker` by default, anything with the same contract works).
//!
//! This crate contains:
//! - The process runner every engine call goes through, with timeouts and cancellation
//! - Image build/run executors and the shared volume lifecycle
//! - The orchestrator that chains stages and escalates failures to the error handler

pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod volume;

mod escalation;

#[cfg(test)]
mod testing;

pub use cancel::CancelToken;
pub use config::{ConfigError, RunnerConfig};
pub use engine::{
    CommandRunner, Invocation, ProcessOutput, ProcessRunner, check_engine_available,
};
pub use error::{
    ExecError, InvocationError, PipelineError, PipelineFailure, StepError, VolumeError,
};
pub use executor::ImageExecutor;
pub use orchestrator::Orchestrator;
pub use volume::{SharedVolume, VolumeManager};
