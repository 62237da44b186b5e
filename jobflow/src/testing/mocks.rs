//! Scripted processors for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::core::{Job, JobId};
use crate::engine::AttemptContext;
use crate::errors::ProcessError;
use crate::processor::Processor;

/// What a [`ScriptedProcessor`] does on each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Every attempt succeeds.
    Succeed,
    /// Every attempt fails with the given message.
    Fail(String),
    /// The first `n` attempts of each job fail, later ones succeed.
    FailTimes(u32),
}

/// One recorded `process` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The job that was processed.
    pub job_id: JobId,
    /// Zero-based attempt index.
    pub attempt: u32,
    /// When the call started, on the tokio clock.
    pub at: Instant,
}

/// A processor that follows a fixed script and records every call.
#[derive(Debug)]
pub struct ScriptedProcessor {
    script: Script,
    delay: Option<Duration>,
    output: Vec<u8>,
    reject_tag: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProcessor {
    /// Creates a processor following `script`.
    #[must_use]
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: None,
            output: b"ok".to_vec(),
            reject_tag: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A processor whose attempts always succeed.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new(Script::Succeed)
    }

    /// A processor whose attempts always fail with `error`.
    #[must_use]
    pub fn failing(error: impl Into<String>) -> Self {
        Self::new(Script::Fail(error.into()))
    }

    /// A processor that fails the first `failures` attempts of each job.
    #[must_use]
    pub fn flaky(failures: u32) -> Self {
        Self::new(Script::FailTimes(failures))
    }

    /// Sleeps for `delay` before answering each attempt.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the output returned by successful attempts.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<Vec<u8>>) -> Self {
        self.output = output.into();
        self
    }

    /// Rejects jobs carrying `tag` during validation.
    #[must_use]
    pub fn rejecting_tag(mut self, tag: impl Into<String>) -> Self {
        self.reject_tag = Some(tag.into());
        self
    }

    /// Returns the number of `process` calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the number of `process` calls for one job.
    #[must_use]
    pub fn calls_for(&self, job_id: &JobId) -> usize {
        self.calls.lock().iter().filter(|c| &c.job_id == job_id).count()
    }

    /// Returns every recorded call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Time between consecutive call starts.
    #[must_use]
    pub fn gaps(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }
}

#[async_trait]
impl Processor for ScriptedProcessor {
    fn validate(&self, job: &Job) -> bool {
        self.reject_tag.as_deref().map_or(true, |tag| !job.has_tag(tag))
    }

    async fn process(&self, ctx: &AttemptContext, job: &Job) -> Result<Vec<u8>, ProcessError> {
        self.calls.lock().push(RecordedCall {
            job_id: job.id().clone(),
            attempt: ctx.attempt(),
            at: Instant::now(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            Script::Succeed => Ok(self.output.clone()),
            Script::Fail(error) => Err(ProcessError::failed(error.clone())),
            Script::FailTimes(n) if ctx.attempt() < *n => Err(ProcessError::failed(format!(
                "transient failure on attempt {}",
                ctx.attempt()
            ))),
            Script::FailTimes(_) => Ok(self.output.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;

    fn ctx(job: &Job, attempt: u32) -> AttemptContext {
        AttemptContext::new(
            job.id().clone(),
            attempt,
            4,
            Duration::from_secs(1),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_flaky_script() {
        let processor = ScriptedProcessor::flaky(1).with_output("done");
        let job = Job::new("a", "test");

        let first = processor.process(&ctx(&job, 0), &job).await;
        assert_eq!(
            first.unwrap_err().to_string(),
            "transient failure on attempt 0"
        );

        let second = processor.process(&ctx(&job, 1), &job).await;
        assert_eq!(second.unwrap(), b"done".to_vec());
        assert_eq!(processor.calls_for(job.id()), 2);
    }

    #[test]
    fn test_rejecting_tag() {
        let processor = ScriptedProcessor::succeeding().rejecting_tag("skip");
        assert!(processor.validate(&Job::new("a", "test")));
        assert!(!processor.validate(&Job::new("b", "test").with_tag("skip")));
    }
}
