//! The worker-pool pipeline.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{Job, JobId};
use crate::engine::ExecutionEngine;
use crate::errors::{JobflowError, Result};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::processor::Processor;

use super::{
    outcome_channels, ErrorStream, JobSlot, JobTable, OutcomeSenders, PipelineStats, ResultStream,
};

/// Lifecycle of a pipeline. A pipeline runs at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Accepting jobs; `run` has not been called.
    #[default]
    Idle,
    /// Workers are executing jobs.
    Running,
    /// Every worker has finished and both streams are closed.
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// A bounded worker pool executing retryable jobs.
///
/// Jobs are added while the pipeline is idle, then [`Pipeline::run`]
/// dispatches every job the processor accepts to a fixed number of
/// workers. Successful results and terminal failures arrive on two bounded
/// streams obtained with [`Pipeline::take_results`] and
/// [`Pipeline::take_errors`].
///
/// The streams apply backpressure: once one is full, the workers producing
/// into it wait. Take and drain both streams when a run produces more
/// outcomes than their capacity.
///
/// ```rust,ignore
/// let pipeline = Pipeline::new(4);
/// pipeline.add_job(Job::new("job-1", "resize"))?;
///
/// let results = pipeline.take_results().unwrap();
/// pipeline.run(&CancellationToken::new(), processor).await?;
/// let results = results.collect().await;
/// ```
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    table: Arc<JobTable>,
    events: Arc<dyn EventSink>,
    state: Arc<watch::Sender<PipelineState>>,
    senders: Mutex<Option<OutcomeSenders>>,
    results: Mutex<Option<ResultStream>>,
    errors: Mutex<Option<ErrorStream>>,
}

impl Pipeline {
    /// Creates a pipeline with `worker_count` workers and default settings.
    ///
    /// A worker count of zero is treated as one.
    pub fn new(worker_count: usize) -> Self {
        Self::with_config(PipelineConfig::default().with_worker_count(worker_count))
    }

    /// Creates a pipeline from a full configuration.
    ///
    /// The configuration is used as given; an invalid one is logged at
    /// `warn`. Use [`Pipeline::try_with_config`] to reject it instead.
    pub fn with_config(mut config: PipelineConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Creating pipeline with an invalid configuration");
        }
        config.worker_count = config.effective_workers();
        let (senders, results, errors) =
            outcome_channels(config.result_capacity(), config.error_capacity());
        let (state, _) = watch::channel(PipelineState::Idle);

        Self {
            config: Arc::new(config),
            table: Arc::new(JobTable::new()),
            events: Arc::new(NoOpEventSink),
            state: Arc::new(state),
            senders: Mutex::new(Some(senders)),
            results: Mutex::new(Some(results)),
            errors: Mutex::new(Some(errors)),
        }
    }

    /// Creates a pipeline, failing with [`JobflowError::Config`] if
    /// [`PipelineConfig::validate`] rejects the configuration.
    pub fn try_with_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    /// Reports lifecycle events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Adds a job, resetting it to `Pending` with no retries.
    ///
    /// Fails with [`JobflowError::AlreadyStarted`] once `run` has been called
    /// and with [`JobflowError::DuplicateJob`] if the id is already present.
    pub fn add_job(&self, job: Job) -> Result<()> {
        if self.state() != PipelineState::Idle {
            return Err(JobflowError::AlreadyStarted);
        }

        let job_id = job.id().clone();
        self.table.insert(job)?;
        debug!(job_id = %job_id, "Job added");
        Ok(())
    }

    /// Runs every accepted job to completion.
    ///
    /// Jobs for which [`Processor::validate`] returns false are skipped and
    /// stay `Pending`. Returns once all workers have finished, or with
    /// [`JobflowError::Cancelled`] as soon as `token` is cancelled. Workers
    /// stop picking up jobs after cancellation and abort in-flight attempts.
    pub async fn run(
        &self,
        token: &CancellationToken,
        processor: Arc<dyn Processor>,
    ) -> Result<()> {
        let started = self.state.send_if_modified(|state| {
            if *state == PipelineState::Idle {
                *state = PipelineState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(JobflowError::AlreadyStarted);
        }

        let senders = self
            .senders
            .lock()
            .take()
            .ok_or(JobflowError::AlreadyStarted)?;

        let snapshot = self.table.seal();
        let total = snapshot.len();
        let eligible = self.eligible_slots(&snapshot, processor.as_ref());
        let workers = self.config.worker_count;

        info!(workers, total, eligible = eligible.len(), "Starting pipeline");
        self.events.try_emit(PipelineEvent::PipelineStarted {
            workers,
            total,
            eligible: eligible.len(),
        });

        let queue = work_queue(eligible);
        let engine = Arc::new(ExecutionEngine::new(
            self.config.clone(),
            self.table.clone(),
            processor,
            self.events.clone(),
            senders,
        ));

        let handles: Vec<JoinHandle<usize>> = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    engine.clone(),
                    queue.clone(),
                    token.clone(),
                ))
            })
            .collect();
        // Streams close once the last worker drops its engine handle.
        drop(engine);

        self.spawn_supervisor(handles);

        let mut state = self.state.subscribe();
        tokio::select! {
            biased;
            () = token.cancelled() => {
                let reason = token.reason().unwrap_or_default();
                warn!(reason = %reason, "Pipeline cancelled");
                self.events.try_emit(PipelineEvent::PipelineCancelled {
                    reason: reason.clone(),
                });
                Err(JobflowError::Cancelled(reason))
            }
            done = state.wait_for(|s| *s == PipelineState::Done) => {
                if done.is_err() {
                    error!("Pipeline state channel closed before completion");
                }
                Ok(())
            }
        }
    }

    fn eligible_slots(
        &self,
        snapshot: &[(JobSlot, Job)],
        processor: &dyn Processor,
    ) -> Vec<JobSlot> {
        snapshot
            .iter()
            .filter_map(|(slot, job)| {
                if processor.validate(job) {
                    Some(*slot)
                } else {
                    debug!(job_id = %job.id(), "Job rejected by validation");
                    self.events.try_emit(PipelineEvent::JobRejected {
                        job_id: job.id().clone(),
                    });
                    None
                }
            })
            .collect()
    }

    fn spawn_supervisor(&self, handles: Vec<JoinHandle<usize>>) {
        let table = self.table.clone();
        let events = self.events.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let mut executed = 0usize;
            for joined in join_all(handles).await {
                match joined {
                    Ok(count) => executed += count,
                    Err(e) => error!(error = %e, "Worker task failed"),
                }
            }

            let stats = table.stats();
            info!(%stats, executed, "Pipeline finished");
            events.try_emit(PipelineEvent::PipelineCompleted { stats });
            state.send_replace(PipelineState::Done);
        });
    }

    /// Current job counts per status.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.table.stats()
    }

    /// Snapshot of a single job.
    #[must_use]
    pub fn job(&self, id: &JobId) -> Option<Job> {
        self.table.find(id)
    }

    /// Snapshot of every job in submission order.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.table.jobs()
    }

    /// Number of jobs added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no job has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of workers a run spawns.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// The pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Waits until every worker has finished.
    ///
    /// Useful after `run` returned early on cancellation. Never returns if
    /// `run` is never called.
    pub async fn wait_done(&self) {
        let mut state = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state.wait_for(|s| *s == PipelineState::Done).await;
    }

    /// Takes the result stream. Returns `None` on every call after the first.
    pub fn take_results(&self) -> Option<ResultStream> {
        self.results.lock().take()
    }

    /// Takes the error stream. Returns `None` on every call after the first.
    pub fn take_errors(&self) -> Option<ErrorStream> {
        self.errors.lock().take()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("jobs", &self.len())
            .finish_non_exhaustive()
    }
}

/// Pre-filled, closed FIFO of job slots shared by the workers.
type WorkQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<JobSlot>>>;

fn work_queue(slots: Vec<JobSlot>) -> WorkQueue {
    let (tx, rx) = mpsc::channel(slots.len().max(1));
    for slot in slots {
        // Capacity covers every slot.
        if tx.try_send(slot).is_err() {
            error!("Work queue rejected a job slot");
        }
    }
    Arc::new(tokio::sync::Mutex::new(rx))
}

async fn worker_loop(
    worker: usize,
    engine: Arc<ExecutionEngine>,
    queue: WorkQueue,
    token: CancellationToken,
) -> usize {
    debug!(worker, "Worker started");
    let mut executed = 0usize;

    loop {
        if token.is_cancelled() {
            debug!(worker, "Worker stopping on cancellation");
            break;
        }

        let next = queue.lock().await.recv().await;
        let Some(slot) = next else {
            break;
        };

        if engine.execute(slot, worker, &token).await.is_some() {
            executed += 1;
        }
    }

    debug!(worker, executed, "Worker finished");
    executed
}
