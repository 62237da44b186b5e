//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

use super::PipelineEvent;

/// Trait for event sinks that can receive pipeline events.
///
/// The pipeline only calls [`EventSink::try_emit`] from its workers, so an
/// implementation must never block for long there.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: PipelineEvent) {
        self.try_emit(event);
    }

    /// Tries to emit an event without blocking.
    ///
    /// This method should never panic. Errors are logged but suppressed.
    fn try_emit(&self, event: PipelineEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: PipelineEvent) {
        let event_type = event.event_type();
        let data = event.to_json();
        if self.level == Level::DEBUG {
            debug!(event_type, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type, event_data = %data, "Event: {}", event_type);
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type name starts with a prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Counts events with exactly the given type name.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobId;

    fn started(id: &str) -> PipelineEvent {
        PipelineEvent::JobStarted {
            job_id: JobId::new(id),
            worker: 0,
        }
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(started("a")).await;
        sink.try_emit(started("b"));
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let sink = LoggingEventSink::debug();
        sink.emit(started("a")).await;
        LoggingEventSink::info().try_emit(PipelineEvent::PipelineCancelled {
            reason: "test".to_string(),
        });
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(started("a")).await;
        sink.try_emit(PipelineEvent::JobRejected {
            job_id: JobId::new("b"),
        });

        assert_eq!(sink.len(), 2);

        let events = sink.events();
        assert_eq!(events[0].event_type(), "job.started");
        assert_eq!(events[1].event_type(), "job.rejected");
    }

    #[test]
    fn test_collecting_sink_filter() {
        let sink = CollectingEventSink::new();
        sink.try_emit(started("a"));
        sink.try_emit(started("b"));
        sink.try_emit(PipelineEvent::PipelineCancelled {
            reason: "stop".to_string(),
        });

        assert_eq!(sink.events_of_type("job.").len(), 2);
        assert_eq!(sink.events_of_type("pipeline.").len(), 1);
        assert_eq!(sink.count("job.started"), 2);

        sink.clear();
        assert!(sink.is_empty());
    }
}
