//! Core domain types
//!
//! Pipeline definitions are immutable descriptions of work; result records are
//! what a run produces and hands back to its caller (or to an error handler).

pub mod pipeline;
pub mod result;
pub mod status;
