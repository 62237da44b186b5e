//! Test assertions for pipeline outcomes.

use crate::core::{JobId, JobStatus};
use crate::errors::JobError;
use crate::pipeline::{Pipeline, PipelineStats};

/// Asserts every status bucket of `stats`.
pub fn assert_stats(
    stats: &PipelineStats,
    total: usize,
    pending: usize,
    running: usize,
    completed: usize,
    failed: usize,
) {
    let expected = PipelineStats {
        total,
        pending,
        running,
        completed,
        failed,
    };
    assert_eq!(*stats, expected, "Expected stats {expected}, got {stats}");
    assert_eq!(stats.accounted(), stats.total, "Buckets do not sum to total");
}

/// Asserts that no job is pending or running.
pub fn assert_all_finished(stats: &PipelineStats) {
    assert_eq!(
        stats.finished(),
        stats.total,
        "Expected every job to be finished, got {stats}"
    );
}

/// Asserts the status of one job.
pub fn assert_job_status(pipeline: &Pipeline, id: &str, expected: JobStatus) {
    let id = JobId::new(id);
    let job = pipeline
        .job(&id)
        .unwrap_or_else(|| panic!("Job {id} not found"));
    assert_eq!(
        job.status(),
        expected,
        "Expected job {id} to be {expected}, got {}",
        job.status()
    );
}

/// Asserts that `error` reports retry exhaustion after `attempts` attempts.
pub fn assert_exhausted(error: &JobError, attempts: u32) {
    assert!(
        matches!(error, JobError::Exhausted { .. }),
        "Expected exhaustion, got: {error}"
    );
    assert_eq!(
        error.attempts(),
        attempts,
        "Expected {attempts} attempts, got {}",
        error.attempts()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProcessError;

    #[test]
    fn test_assert_stats_passes() {
        let stats = PipelineStats::from_statuses([JobStatus::Completed, JobStatus::Failed]);
        assert_stats(&stats, 2, 0, 0, 1, 1);
        assert_all_finished(&stats);
    }

    #[test]
    #[should_panic(expected = "Expected stats")]
    fn test_assert_stats_fails() {
        let stats = PipelineStats::from_statuses([JobStatus::Pending]);
        assert_stats(&stats, 1, 0, 0, 1, 0);
    }

    #[test]
    fn test_assert_exhausted() {
        let err = JobError::Exhausted {
            job_id: JobId::new("a"),
            attempts: 4,
            source: ProcessError::failed("boom"),
        };
        assert_exhausted(&err, 4);
    }
}
