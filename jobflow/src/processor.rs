//! Processor trait and implementations.
//!
//! A processor is the externally supplied strategy that decides whether a
//! job is eligible and performs the actual work. The pipeline depends on it
//! but never implements domain logic itself.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::core::Job;
use crate::engine::AttemptContext;
use crate::errors::ProcessError;

/// Trait for job processors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Processor: Send + Sync {
    /// Returns true if the job should be dispatched.
    ///
    /// Called once per job before any worker starts. Jobs rejected here are
    /// never executed and stay `Pending`.
    fn validate(&self, job: &Job) -> bool;

    /// Executes one attempt of the job.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The bounded context of this attempt
    /// * `job` - A snapshot of the job being processed
    ///
    /// # Returns
    ///
    /// The opaque output on success, or the reason this attempt failed.
    async fn process(&self, ctx: &AttemptContext, job: &Job) -> Result<Vec<u8>, ProcessError>;
}

fn accept_all(_job: &Job) -> bool {
    true
}

/// A simple function-based processor.
pub struct FnProcessor<V, F>
where
    V: Fn(&Job) -> bool + Send + Sync,
    F: Fn(&AttemptContext, &Job) -> Result<Vec<u8>, ProcessError> + Send + Sync,
{
    name: String,
    validator: V,
    func: F,
}

impl<F> FnProcessor<fn(&Job) -> bool, F>
where
    F: Fn(&AttemptContext, &Job) -> Result<Vec<u8>, ProcessError> + Send + Sync,
{
    /// Creates a processor that accepts every job.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            validator: accept_all,
            func,
        }
    }
}

impl<V, F> FnProcessor<V, F>
where
    V: Fn(&Job) -> bool + Send + Sync,
    F: Fn(&AttemptContext, &Job) -> Result<Vec<u8>, ProcessError> + Send + Sync,
{
    /// Creates a processor with a custom validator.
    pub fn with_validator(name: impl Into<String>, validator: V, func: F) -> Self {
        Self {
            name: name.into(),
            validator,
            func,
        }
    }

    /// Returns the processor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<V, F> Debug for FnProcessor<V, F>
where
    V: Fn(&Job) -> bool + Send + Sync,
    F: Fn(&AttemptContext, &Job) -> Result<Vec<u8>, ProcessError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProcessor")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<V, F> Processor for FnProcessor<V, F>
where
    V: Fn(&Job) -> bool + Send + Sync,
    F: Fn(&AttemptContext, &Job) -> Result<Vec<u8>, ProcessError> + Send + Sync,
{
    fn validate(&self, job: &Job) -> bool {
        (self.validator)(job)
    }

    async fn process(&self, ctx: &AttemptContext, job: &Job) -> Result<Vec<u8>, ProcessError> {
        (self.func)(ctx, job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use std::time::Duration;

    fn ctx(job: &Job) -> AttemptContext {
        AttemptContext::new(
            job.id().clone(),
            0,
            1,
            Duration::from_secs(1),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_fn_processor() {
        let processor = FnProcessor::new("echo", |_ctx, job| Ok(job.name().as_bytes().to_vec()));
        let job = Job::new("job-1", "hello");

        assert_eq!(processor.name(), "echo");
        assert!(processor.validate(&job));

        let output = processor.process(&ctx(&job), &job).await.unwrap();
        assert_eq!(output, b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_fn_processor_with_validator() {
        let processor = FnProcessor::with_validator(
            "tagged-only",
            |job: &Job| job.has_tag("batch"),
            |_ctx, _job| Err(ProcessError::failed("nope")),
        );

        assert!(processor.validate(&Job::new("a", "a").with_tag("batch")));
        assert!(!processor.validate(&Job::new("b", "b")));

        let job = Job::new("a", "a");
        let err = processor.process(&ctx(&job), &job).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
