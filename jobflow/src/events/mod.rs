//! Event sink system for observability.
//!
//! The pipeline reports lifecycle transitions as [`PipelineEvent`]s to an
//! injected [`EventSink`]. Nothing is emitted unless a sink is configured.

mod event;
mod sink;

pub use event::PipelineEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
