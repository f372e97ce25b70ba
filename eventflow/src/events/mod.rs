//! Run lifecycle events.
//!
//! The manager reports batch and run transitions to an [`EventSink`]
//! injected at construction. Event type names are listed in [`event_types`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Names of the lifecycle events emitted by the manager.
pub mod event_types {
    /// A batch of runs is about to start.
    pub const BATCH_STARTED: &str = "batch.started";
    /// Every run of the batch has finished.
    pub const BATCH_COMPLETED: &str = "batch.completed";
    /// One run acquired a worker and is starting.
    pub const RUN_STARTED: &str = "run.started";
    /// One run finished without a fatal error.
    pub const RUN_COMPLETED: &str = "run.completed";
    /// One run stopped on a fatal error.
    pub const RUN_FAILED: &str = "run.failed";
    /// One run stopped on a cancellation request.
    pub const RUN_CANCELLED: &str = "run.cancelled";
}
