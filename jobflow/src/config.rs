//! Pipeline configuration.
//!
//! Configuration can be built in code with the `with_*` builders, or loaded
//! from JSON where any omitted field takes its default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::engine::RetryConfig;
use crate::errors::{JobflowError, Result};

/// Configuration for a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent workers. Zero is coerced to one.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Deadline for a single processing attempt, in milliseconds.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_worker_count() -> usize {
    1
}

fn default_attempt_timeout_ms() -> u64 {
    30_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Gets the per-attempt timeout as a Duration.
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Worker count after coercing zero to one.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.worker_count.max(1)
    }

    /// Capacity of the result stream.
    #[must_use]
    pub fn result_capacity(&self) -> usize {
        self.effective_workers().saturating_mul(2)
    }

    /// Capacity of the error stream.
    #[must_use]
    pub fn error_capacity(&self) -> usize {
        self.effective_workers()
    }

    /// Checks the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.attempt_timeout_ms == 0 {
            return Err(JobflowError::Config(
                "attempt_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(JobflowError::Config(format!(
                "retry.max_delay_ms ({}) is below retry.base_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.base_delay_ms
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BackoffStrategy;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.worker_count, 1);
        assert_eq!(config.attempt_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_coerced() {
        let config = PipelineConfig::new().with_worker_count(0);
        assert_eq!(config.effective_workers(), 1);
        assert_eq!(config.result_capacity(), 2);
        assert_eq!(config.error_capacity(), 1);
    }

    #[test]
    fn test_capacities_follow_worker_count() {
        let config = PipelineConfig::new().with_worker_count(4);
        assert_eq!(config.result_capacity(), 8);
        assert_eq!(config.error_capacity(), 4);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = PipelineConfig::new().with_attempt_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(JobflowError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let config = PipelineConfig::new().with_retry(
            RetryConfig::new()
                .with_base_delay_ms(5000)
                .with_max_delay_ms(100),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = PipelineConfig::from_json_str(
            r#"{"worker_count": 8, "retry": {"max_retries": 5, "backoff_strategy": "linear"}}"#,
        )
        .unwrap();

        assert_eq!(config.worker_count, 8);
        assert_eq!(config.attempt_timeout_ms, 30_000);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff_strategy, BackoffStrategy::Linear);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = PipelineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, JobflowError::Serialization(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"worker_count": 3, "attempt_timeout_ms": 500}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.attempt_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_from_missing_file() {
        let err = PipelineConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, JobflowError::Io(_)));
    }
}
