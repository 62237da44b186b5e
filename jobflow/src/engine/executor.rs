//! Per-job retry loop.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{Job, JobResult, JobStatus};
use crate::errors::{JobError, ProcessError};
use crate::events::{EventSink, PipelineEvent};
use crate::pipeline::{JobSlot, JobTable, OutcomeSenders};
use crate::processor::Processor;

use super::AttemptContext;

/// How the attempts of one job ended.
#[derive(Debug)]
enum AttemptsOutcome {
    Succeeded {
        output: Vec<u8>,
        attempt: u32,
        recovered_error: Option<String>,
    },
    Exhausted {
        error: ProcessError,
    },
    Cancelled {
        attempts: u32,
        reason: String,
    },
}

/// Executes jobs with retries, backoff and per-attempt deadlines.
///
/// Owns everything a worker needs: the job table for status transitions,
/// the processor, the event sink and the outcome senders. One engine is
/// shared by all workers of a run.
pub(crate) struct ExecutionEngine {
    config: Arc<PipelineConfig>,
    table: Arc<JobTable>,
    processor: Arc<dyn Processor>,
    events: Arc<dyn EventSink>,
    outcomes: OutcomeSenders,
}

impl ExecutionEngine {
    pub(crate) fn new(
        config: Arc<PipelineConfig>,
        table: Arc<JobTable>,
        processor: Arc<dyn Processor>,
        events: Arc<dyn EventSink>,
        outcomes: OutcomeSenders,
    ) -> Self {
        Self {
            config,
            table,
            processor,
            events,
            outcomes,
        }
    }

    /// Runs one job to a terminal status and publishes its outcome.
    ///
    /// Returns the terminal status, or `None` if the job could not be started.
    pub(crate) async fn execute(
        &self,
        slot: JobSlot,
        worker: usize,
        token: &CancellationToken,
    ) -> Option<JobStatus> {
        let job = match self.table.start(slot) {
            Ok(job) => job,
            Err(e) => {
                error!(worker, error = %e, "Could not start job");
                return None;
            }
        };

        info!(worker, job_id = %job.id(), "Starting job execution");
        self.events.try_emit(PipelineEvent::JobStarted {
            job_id: job.id().clone(),
            worker,
        });

        let started = Instant::now();
        let outcome = self.run_attempts(slot, &job, worker, token).await;
        let max_retries = self.config.retry.max_retries;

        // Table updates first; the lock is released before any send.
        match outcome {
            AttemptsOutcome::Succeeded {
                output,
                attempt,
                recovered_error,
            } => {
                self.finish(slot, JobStatus::Completed, attempt)?;
                let result = JobResult {
                    job_id: job.id().clone(),
                    duration: started.elapsed(),
                    output,
                    attempts: attempt + 1,
                    recovered_error,
                };

                info!(
                    worker,
                    job_id = %job.id(),
                    attempts = result.attempts,
                    duration_ms = duration_ms(result.duration),
                    "Job completed"
                );
                self.events.try_emit(PipelineEvent::JobCompleted {
                    job_id: result.job_id.clone(),
                    attempts: result.attempts,
                    duration_ms: duration_ms(result.duration),
                });
                self.outcomes.send_result(result).await;
                Some(JobStatus::Completed)
            }
            AttemptsOutcome::Exhausted { error } => {
                self.finish(slot, JobStatus::Failed, max_retries)?;
                let err = JobError::Exhausted {
                    job_id: job.id().clone(),
                    attempts: self.config.retry.max_attempts(),
                    source: error,
                };

                error!(worker, job_id = %job.id(), error = %err, "Job failed");
                self.emit_failed(&err);
                self.outcomes.send_error(err).await;
                Some(JobStatus::Failed)
            }
            AttemptsOutcome::Cancelled { attempts, reason } => {
                self.finish(slot, JobStatus::Failed, attempts.saturating_sub(1))?;
                let err = JobError::Cancelled {
                    job_id: job.id().clone(),
                    attempts,
                    reason,
                };

                warn!(worker, job_id = %job.id(), error = %err, "Job cancelled");
                self.emit_failed(&err);
                self.outcomes.offer_error(err);
                Some(JobStatus::Failed)
            }
        }
    }

    async fn run_attempts(
        &self,
        slot: JobSlot,
        job: &Job,
        worker: usize,
        token: &CancellationToken,
    ) -> AttemptsOutcome {
        let retry = &self.config.retry;
        let mut last_error: Option<ProcessError> = None;

        for attempt in 0..=retry.max_retries {
            if attempt > 0 {
                let delay = retry.delay_for_attempt(attempt);
                if let Err(e) = self.table.record_retry(slot, attempt) {
                    warn!(worker, job_id = %job.id(), error = %e, "Could not record retry");
                }

                info!(
                    worker,
                    job_id = %job.id(),
                    attempt,
                    max_retries = retry.max_retries,
                    delay_ms = duration_ms(delay),
                    "Retrying job after backoff"
                );
                self.events.try_emit(PipelineEvent::RetryScheduled {
                    job_id: job.id().clone(),
                    attempt,
                    delay_ms: duration_ms(delay),
                });

                if !self.backoff(delay, token).await {
                    return cancelled(attempt, token);
                }
            }

            if token.is_cancelled() {
                return cancelled(attempt, token);
            }

            match self.attempt(job, attempt, token).await {
                Ok(output) => {
                    return AttemptsOutcome::Succeeded {
                        output,
                        attempt,
                        recovered_error: last_error.map(|e| e.to_string()),
                    };
                }
                Err(e) if e.is_cancelled() && token.is_cancelled() => {
                    return cancelled(attempt + 1, token);
                }
                Err(e) => {
                    warn!(worker, job_id = %job.id(), attempt, error = %e, "Job attempt failed");
                    self.events.try_emit(PipelineEvent::AttemptFailed {
                        job_id: job.id().clone(),
                        attempt,
                        error: e.to_string(),
                    });
                    last_error = Some(e);
                }
            }
        }

        AttemptsOutcome::Exhausted {
            error: last_error.unwrap_or_else(|| ProcessError::failed("no attempt was made")),
        }
    }

    /// Runs one bounded attempt, racing it against the deadline and the token.
    async fn attempt(
        &self,
        job: &Job,
        attempt: u32,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, ProcessError> {
        let timeout = self.config.attempt_timeout();
        let ctx = AttemptContext::new(
            job.id().clone(),
            attempt,
            self.config.retry.max_attempts(),
            timeout,
            token.child_token(),
        );

        let result = tokio::select! {
            biased;
            () = token.cancelled() => {
                Err(ProcessError::Cancelled(token.reason().unwrap_or_default()))
            }
            outcome = tokio::time::timeout(timeout, self.guarded_process(&ctx, job)) => {
                outcome.unwrap_or(Err(ProcessError::TimedOut(timeout)))
            }
        };

        ctx.close("attempt finished");
        result
    }

    /// Calls the processor, turning a panic into a failed attempt.
    async fn guarded_process(
        &self,
        ctx: &AttemptContext,
        job: &Job,
    ) -> Result<Vec<u8>, ProcessError> {
        // The call itself sits inside the guarded future so a processor that
        // panics before returning its future is caught too.
        match AssertUnwindSafe(async { self.processor.process(ctx, job).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    job_id = %job.id(),
                    attempt = ctx.attempt(),
                    panic = %message,
                    "Processor panicked"
                );
                Err(ProcessError::failed(format!("processor panicked: {message}")))
            }
        }
    }

    /// Sleeps for `delay`. Returns false if cancelled first.
    async fn backoff(&self, delay: Duration, token: &CancellationToken) -> bool {
        if delay.is_zero() {
            return !token.is_cancelled();
        }

        if !self.config.retry.cancellable_backoff {
            tokio::time::sleep(delay).await;
            return true;
        }

        tokio::select! {
            () = token.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    fn finish(&self, slot: JobSlot, status: JobStatus, retry_count: u32) -> Option<()> {
        match self.table.finish(slot, status, retry_count) {
            Ok(()) => Some(()),
            Err(e) => {
                error!(error = %e, "Could not record job outcome");
                None
            }
        }
    }

    fn emit_failed(&self, err: &JobError) {
        self.events.try_emit(PipelineEvent::JobFailed {
            job_id: err.job_id().clone(),
            attempts: err.attempts(),
            error: err.to_string(),
        });
    }
}

fn cancelled(attempts: u32, token: &CancellationToken) -> AttemptsOutcome {
    let reason = token.reason().unwrap_or_default();
    debug!(attempts, reason = %reason, "Stopping job on cancellation");
    AttemptsOutcome::Cancelled { attempts, reason }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
