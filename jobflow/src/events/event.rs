//! Lifecycle events emitted by the pipeline.

use serde::Serialize;

use crate::core::JobId;
use crate::pipeline::PipelineStats;

/// An observable pipeline or job lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// `run` dispatched its eligible jobs to the worker pool.
    PipelineStarted {
        /// Size of the worker pool.
        workers: usize,
        /// Jobs known to the pipeline.
        total: usize,
        /// Jobs that passed validation.
        eligible: usize,
    },
    /// All workers finished.
    PipelineCompleted {
        /// Final job counts.
        stats: PipelineStats,
    },
    /// The top-level token fired before the workers finished.
    PipelineCancelled {
        /// The cancellation reason.
        reason: String,
    },
    /// A job failed validation and will stay pending.
    JobRejected {
        /// The rejected job.
        job_id: JobId,
    },
    /// A worker picked up a job.
    JobStarted {
        /// The job.
        job_id: JobId,
        /// The worker index.
        worker: usize,
    },
    /// One attempt failed.
    AttemptFailed {
        /// The job.
        job_id: JobId,
        /// 0-indexed attempt number.
        attempt: u32,
        /// Why the attempt failed.
        error: String,
    },
    /// A retry will start after a backoff delay.
    RetryScheduled {
        /// The job.
        job_id: JobId,
        /// 0-indexed number of the upcoming attempt.
        attempt: u32,
        /// Backoff before the attempt starts.
        delay_ms: u64,
    },
    /// A job completed successfully.
    JobCompleted {
        /// The job.
        job_id: JobId,
        /// Attempts made.
        attempts: u32,
        /// Time spent in `Running`.
        duration_ms: u64,
    },
    /// A job ended in `Failed`.
    JobFailed {
        /// The job.
        job_id: JobId,
        /// Attempts made.
        attempts: u32,
        /// The terminal error.
        error: String,
    },
}

impl PipelineEvent {
    /// Dotted event type name, e.g. `job.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PipelineStarted { .. } => "pipeline.started",
            Self::PipelineCompleted { .. } => "pipeline.completed",
            Self::PipelineCancelled { .. } => "pipeline.cancelled",
            Self::JobRejected { .. } => "job.rejected",
            Self::JobStarted { .. } => "job.started",
            Self::AttemptFailed { .. } => "job.attempt_failed",
            Self::RetryScheduled { .. } => "job.retry_scheduled",
            Self::JobCompleted { .. } => "job.completed",
            Self::JobFailed { .. } => "job.failed",
        }
    }

    /// The job this event concerns, if any.
    #[must_use]
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::JobRejected { job_id }
            | Self::JobStarted { job_id, .. }
            | Self::AttemptFailed { job_id, .. }
            | Self::RetryScheduled { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobFailed { job_id, .. } => Some(job_id),
            Self::PipelineStarted { .. }
            | Self::PipelineCompleted { .. }
            | Self::PipelineCancelled { .. } => None,
        }
    }

    /// Event payload as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_names() {
        let event = PipelineEvent::RetryScheduled {
            job_id: JobId::new("job-1"),
            attempt: 2,
            delay_ms: 4000,
        };
        assert_eq!(event.event_type(), "job.retry_scheduled");
        assert_eq!(event.job_id().map(JobId::as_str), Some("job-1"));

        let cancelled = PipelineEvent::PipelineCancelled {
            reason: "shutdown".to_string(),
        };
        assert_eq!(cancelled.event_type(), "pipeline.cancelled");
        assert!(cancelled.job_id().is_none());
    }

    #[test]
    fn test_event_json() {
        let event = PipelineEvent::JobStarted {
            job_id: JobId::new("job-1"),
            worker: 3,
        };
        assert_eq!(
            event.to_json(),
            json!({"type": "job_started", "job_id": "job-1", "worker": 3})
        );
    }
}
