//! Testing utilities for jobflow pipelines.
//!
//! This module provides:
//! - A scripted processor that records its calls
//! - Job and configuration fixtures
//! - Assertions over stats and outcomes

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_all_finished, assert_exhausted, assert_job_status, assert_stats};
pub use fixtures::{fast_config, test_job, test_jobs, TestPipeline};
pub use mocks::{RecordedCall, Script, ScriptedProcessor};
