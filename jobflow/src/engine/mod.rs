//! Job execution: attempt contexts, retry policy and the per-job retry loop.

mod context;
mod executor;
mod retry;

pub use context::AttemptContext;
pub(crate) use executor::ExecutionEngine;
pub use retry::{BackoffStrategy, JitterStrategy, RetryConfig};
