//! Successful job outcome.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::JobId;

/// The outcome of a job that completed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// The job that produced this result.
    pub job_id: JobId,
    /// Time from the job entering `Running` to its successful attempt returning.
    pub duration: Duration,
    /// Opaque output produced by the processor.
    pub output: Vec<u8>,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    /// Error of the last failed attempt, when the job recovered after retrying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_error: Option<String>,
}

impl JobResult {
    /// Creates a result for a first-try success.
    #[must_use]
    pub fn new(job_id: JobId, duration: Duration, output: Vec<u8>) -> Self {
        Self {
            job_id,
            duration,
            output,
            attempts: 1,
            recovered_error: None,
        }
    }

    /// Returns true if earlier attempts failed before this one succeeded.
    #[must_use]
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns the output as UTF-8 text, if valid.
    #[must_use]
    pub fn output_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.output).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_try_result() {
        let result = JobResult::new(JobId::new("job-1"), Duration::from_millis(5), b"ok".to_vec());
        assert_eq!(result.attempts, 1);
        assert!(!result.was_retried());
        assert_eq!(result.output_str(), Some("ok"));
    }

    #[test]
    fn test_recovered_error_is_skipped_when_absent() {
        let result = JobResult::new(JobId::new("job-1"), Duration::ZERO, Vec::new());
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("recovered_error").is_none());
    }
}
