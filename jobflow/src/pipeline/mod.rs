//! Pipeline orchestration.
//!
//! This module provides:
//! - The worker-pool [`Pipeline`] and its lifecycle state
//! - The result and error streams
//! - Aggregate job statistics

mod orchestrator;
mod outcomes;
mod stats;
mod table;


pub use orchestrator::{Pipeline, PipelineState};
pub use outcomes::{ErrorStream, OutcomeStream, ResultStream};
pub use stats::PipelineStats;

pub(crate) use outcomes::{outcome_channels, OutcomeSenders};
pub(crate) use table::{JobSlot, JobTable};
