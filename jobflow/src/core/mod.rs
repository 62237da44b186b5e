//! Core domain model types for jobflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Job records and their opaque payloads
//! - Job lifecycle status
//! - Successful job results

mod job;
mod result;
mod status;

pub use job::{Job, JobId, Payload};
pub use result::JobResult;
pub use status::JobStatus;
