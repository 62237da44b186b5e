//! Error types for the jobflow crate.
//!
//! Three layers, from innermost to outermost:
//! - [`ProcessError`]: one attempt failed; recovered by the retry loop.
//! - [`JobError`]: a job reached a terminal failure; delivered on the error stream.
//! - [`JobflowError`]: pipeline-level misuse or cancellation; returned to the caller.

use std::time::Duration;
use thiserror::Error;

use crate::core::{JobId, JobStatus};

/// Convenience alias for pipeline-level results.
pub type Result<T> = std::result::Result<T, JobflowError>;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum JobflowError {
    /// The top-level cancellation token fired before all workers finished.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// The pipeline has already left the idle state.
    #[error("Pipeline has already been started")]
    AlreadyStarted,

    /// A job with the same id was already added.
    #[error("Duplicate job id: {0}")]
    DuplicateJob(JobId),

    /// No job with the given id exists.
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// A status change that the lifecycle does not allow.
    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        /// The job whose status was being changed.
        job_id: JobId,
        /// The status the job was in.
        from: JobStatus,
        /// The status that was requested.
        to: JobStatus,
    },

    /// The configuration is not usable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobflowError {
    /// Returns true if this error came from cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Failure of a single processing attempt.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The processor reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The attempt did not finish before its deadline.
    #[error("Attempt timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The attempt was aborted by cancellation.
    #[error("Attempt cancelled: {0}")]
    Cancelled(String),

    /// Any other processor error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProcessError {
    /// Creates a processor failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns true if the attempt hit its deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Returns true if the attempt was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Terminal failure of a job, delivered on the error stream.
#[derive(Debug, Error)]
pub enum JobError {
    /// Every attempt failed.
    #[error("Job {job_id} failed after {attempts} attempts: {source}")]
    Exhausted {
        /// The failed job.
        job_id: JobId,
        /// Number of attempts made.
        attempts: u32,
        /// Error of the last attempt.
        #[source]
        source: ProcessError,
    },

    /// The pipeline was cancelled while the job was in flight.
    #[error("Job {job_id} cancelled after {attempts} attempts: {reason}")]
    Cancelled {
        /// The cancelled job.
        job_id: JobId,
        /// Number of attempts started before cancellation.
        attempts: u32,
        /// The cancellation reason.
        reason: String,
    },
}

impl JobError {
    /// Returns the id of the job that failed.
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Exhausted { job_id, .. } | Self::Cancelled { job_id, .. } => job_id,
        }
    }

    /// Returns the number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Returns true if the job was cancelled rather than exhausted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
