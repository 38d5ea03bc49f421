//! Relay Core
//!
//! Core types for the Relay container pipeline engine.
//!
//! This crate contains:
//! - Domain types: pipeline and stage definitions, execution records
//! - The status taxonomy and exit-code classification
//! - Environment merging for build and run variables

pub mod domain;
pub mod env;

pub use domain::pipeline::{Pipeline, Stage, ValidationError, image_tag};
pub use domain::result::{CmdResult, PipelineResult, StageExecutionResult};
pub use domain::status::{NOT_STARTED, Phase, SIGNALLED, Status, classify};
pub use env::merge;
