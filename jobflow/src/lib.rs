//! # Jobflow
//!
//! A bounded worker pool for retryable jobs.
//!
//! Jobflow runs a batch of jobs on a fixed number of tokio workers with
//! support for:
//!
//! - **Retries with backoff**: each job gets up to `max_retries + 1` attempts
//! - **Per-attempt timeouts**: every attempt runs under its own deadline
//! - **Separate outcome streams**: results and terminal errors on bounded channels
//! - **Cancellation**: a hierarchical token stops workers and in-flight attempts
//! - **Event-driven observability**: lifecycle events through an injected sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobflow::prelude::*;
//!
//! let pipeline = Pipeline::new(4);
//! pipeline.add_job(Job::new("job-1", "thumbnail"))?;
//!
//! let processor = Arc::new(FnProcessor::new("thumbnail", |_ctx, job| {
//!     Ok(job.name().as_bytes().to_vec())
//! }));
//!
//! let results = pipeline.take_results().unwrap();
//! pipeline.run(&CancellationToken::new(), processor).await?;
//! for result in results.collect().await {
//!     println!("{} finished in {:?}", result.job_id, result.duration);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod processor;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::PipelineConfig;
    pub use crate::core::{Job, JobId, JobResult, JobStatus, Payload};
    pub use crate::engine::{AttemptContext, BackoffStrategy, JitterStrategy, RetryConfig};
    pub use crate::errors::{JobError, JobflowError, ProcessError, Result};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{ErrorStream, Pipeline, PipelineState, PipelineStats, ResultStream};
    pub use crate::processor::{FnProcessor, Processor};
}
