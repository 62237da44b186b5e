//! Test fixtures for pipeline testing.

use std::time::Duration;

use crate::config::PipelineConfig;
use crate::core::Job;
use crate::engine::RetryConfig;
use crate::pipeline::Pipeline;

/// Creates a job with a test name.
#[must_use]
pub fn test_job(id: &str) -> Job {
    Job::new(id, format!("test {id}"))
}

/// Creates `count` jobs named `job-0`, `job-1`, ...
#[must_use]
pub fn test_jobs(count: usize) -> Vec<Job> {
    (0..count).map(|i| test_job(&format!("job-{i}"))).collect()
}

/// A configuration with millisecond backoff and a one second attempt timeout.
#[must_use]
pub fn fast_config(workers: usize) -> PipelineConfig {
    PipelineConfig::default()
        .with_worker_count(workers)
        .with_attempt_timeout(Duration::from_secs(1))
        .with_retry(
            RetryConfig::new()
                .with_base_delay_ms(1)
                .with_max_delay_ms(10),
        )
}

/// A pipeline builder for tests.
#[derive(Debug)]
pub struct TestPipeline {
    config: PipelineConfig,
    jobs: Vec<Job>,
}

impl TestPipeline {
    /// Creates a builder with `workers` workers and default settings.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            config: PipelineConfig::default().with_worker_count(workers),
            jobs: Vec::new(),
        }
    }

    /// Creates a builder using [`fast_config`].
    #[must_use]
    pub fn fast(workers: usize) -> Self {
        Self {
            config: fast_config(workers),
            jobs: Vec::new(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a job.
    #[must_use]
    pub fn with_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    /// Adds `count` generated jobs.
    #[must_use]
    pub fn with_jobs(mut self, count: usize) -> Self {
        self.jobs.extend(test_jobs(count));
        self
    }

    /// Builds the pipeline with every job added.
    ///
    /// # Panics
    ///
    /// Panics if two jobs share an id.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let pipeline = Pipeline::with_config(self.config);
        for job in self.jobs {
            pipeline.add_job(job).expect("test jobs must have unique ids");
        }
        pipeline
    }
}
