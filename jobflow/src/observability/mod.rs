//! Observability utilities.
//!
//! Pipelines log through `tracing`; [`init_tracing`] installs a subscriber
//! for binaries and tests that want to see the output.

mod tracing;

pub use self::tracing::{init_tracing, LogFormat};
