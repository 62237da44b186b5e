//! Result and error streams.
//!
//! Workers produce into bounded channels; the caller drains them
//! independently. A full stream blocks the producing worker until the
//! caller makes room.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::core::JobResult;
use crate::errors::JobError;

/// Receiving half of a bounded outcome stream.
#[derive(Debug)]
pub struct OutcomeStream<T> {
    rx: mpsc::Receiver<T>,
}

/// Stream of successful job results.
pub type ResultStream = OutcomeStream<JobResult>;

/// Stream of terminal job failures.
pub type ErrorStream = OutcomeStream<JobError>;

impl<T> OutcomeStream<T> {
    /// Waits for the next outcome.
    ///
    /// Returns `None` once the pipeline has finished and the stream is empty.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns the next outcome if one is ready.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Takes every outcome that is ready right now.
    pub fn drain_ready(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Collects outcomes until the pipeline finishes.
    pub async fn collect(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.rx.recv().await {
            items.push(item);
        }
        items
    }
}

/// Creates the sender pair and the two caller-facing streams.
pub(crate) fn outcome_channels(
    result_capacity: usize,
    error_capacity: usize,
) -> (OutcomeSenders, ResultStream, ErrorStream) {
    let (results_tx, results_rx) = mpsc::channel(result_capacity.max(1));
    let (errors_tx, errors_rx) = mpsc::channel(error_capacity.max(1));
    (
        OutcomeSenders {
            results: results_tx,
            errors: errors_tx,
        },
        OutcomeStream { rx: results_rx },
        OutcomeStream { rx: errors_rx },
    )
}

/// Producing halves, cloned into every worker.
#[derive(Debug, Clone)]
pub(crate) struct OutcomeSenders {
    results: mpsc::Sender<JobResult>,
    errors: mpsc::Sender<JobError>,
}

impl OutcomeSenders {
    /// Delivers a result, waiting for room if the stream is full.
    pub(crate) async fn send_result(&self, result: JobResult) {
        if let Err(e) = self.results.send(result).await {
            debug!(job_id = %e.0.job_id, "Result stream closed, dropping result");
        }
    }

    /// Delivers a terminal failure, waiting for room if the stream is full.
    pub(crate) async fn send_error(&self, error: JobError) {
        if let Err(e) = self.errors.send(error).await {
            debug!(job_id = %e.0.job_id(), "Error stream closed, dropping error");
        }
    }

    /// Delivers a terminal failure only if there is room right now.
    pub(crate) fn offer_error(&self, error: JobError) {
        match self.errors.try_send(error) {
            Ok(()) => {}
            Err(TrySendError::Full(e)) => {
                warn!(job_id = %e.job_id(), error = %e, "Error stream full, dropping error");
            }
            Err(TrySendError::Closed(e)) => {
                debug!(job_id = %e.job_id(), "Error stream closed, dropping error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobId;
    use std::time::Duration;

    fn result(id: &str) -> JobResult {
        JobResult::new(JobId::new(id), Duration::ZERO, Vec::new())
    }

    fn cancelled(id: &str) -> JobError {
        JobError::Cancelled {
            job_id: JobId::new(id),
            attempts: 1,
            reason: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_collect_ends_when_senders_drop() {
        let (senders, results, _errors) = outcome_channels(4, 2);

        senders.send_result(result("a")).await;
        senders.send_result(result("b")).await;
        drop(senders);

        let collected = results.collect().await;
        let ids: Vec<_> = collected.iter().map(|r| r.job_id.to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_drain_ready_does_not_wait() {
        let (senders, mut results, _errors) = outcome_channels(4, 2);
        assert!(results.try_recv().is_none());

        senders.send_result(result("a")).await;
        assert_eq!(results.drain_ready().len(), 1);
        assert!(results.drain_ready().is_empty());
    }

    #[tokio::test]
    async fn test_offer_error_drops_when_full() {
        let (senders, _results, mut errors) = outcome_channels(2, 1);

        senders.offer_error(cancelled("a"));
        senders.offer_error(cancelled("b"));

        let drained = errors.drain_ready();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].job_id().as_str(), "a");
    }

    #[tokio::test]
    async fn test_send_after_stream_dropped_is_silent() {
        let (senders, results, errors) = outcome_channels(1, 1);
        drop(results);
        drop(errors);

        senders.send_result(result("a")).await;
        senders.send_error(cancelled("a")).await;
        senders.offer_error(cancelled("b"));
    }
}
