//! Bounded context for a single processing attempt.

use std::time::Duration;
use tokio::time::Instant;

use crate::cancellation::CancellationToken;
use crate::core::JobId;

/// The scope one [`Processor::process`](crate::processor::Processor::process)
/// call runs in.
///
/// Carries a child of the pipeline's cancellation token and the attempt's
/// deadline. The engine enforces both; processors may also poll them to stop
/// early or to propagate cancellation into work they spawn.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    job_id: JobId,
    attempt: u32,
    max_attempts: u32,
    timeout: Duration,
    deadline: Instant,
    token: CancellationToken,
}

impl AttemptContext {
    /// Creates a context whose deadline is `timeout` from now.
    #[must_use]
    pub fn new(
        job_id: JobId,
        attempt: u32,
        max_attempts: u32,
        timeout: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            attempt,
            max_attempts,
            timeout,
            deadline: Instant::now() + timeout,
            token,
        }
    }

    /// The job being processed.
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// 0-indexed attempt number.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Total attempts the job may make.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns true if this attempt is a retry.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }

    /// Returns true if no further attempt follows this one.
    #[must_use]
    pub fn is_last_attempt(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }

    /// The configured per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The instant this attempt times out.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// The attempt-scoped cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns true if the attempt was cancelled or its deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Waits until the attempt is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        tokio::select! {
            () = self.token.cancelled() => {}
            () = tokio::time::sleep_until(self.deadline) => {}
        }
    }

    /// Ends the attempt scope, cancelling anything still observing it.
    pub(crate) fn close(&self, reason: &str) {
        self.token.cancel(reason);
    }
}
