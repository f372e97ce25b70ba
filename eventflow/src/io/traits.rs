//! Persistence collaborator interfaces.
//!
//! The executor never inspects the serialized layout of an artifact; it only
//! relies on open/read/write/close succeeding or failing.

use crate::core::Event;
use crate::errors::{ResourceOpenError, Result};
use crate::statistics::Statistics;
use std::fmt::Debug;
use std::path::Path;

/// Sequential source of events for one run.
pub trait EventReader: Send {
    /// Returns the next event, or `None` once the input is exhausted.
    fn next_event(&mut self) -> Result<Option<Event>>;

    /// Releases the input. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Sink for the events and statistics a run produces.
pub trait EventWriter: Send {
    /// Appends one event.
    fn write(&mut self, event: &Event) -> Result<()>;

    /// Persists the run statistics alongside the events.
    fn write_statistics(&mut self, stats: &Statistics) -> Result<()>;

    /// Returns true until `close` has been called.
    fn is_open(&self) -> bool;

    /// Flushes and releases the output. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Opens readers and creates writers for resolved artifact paths.
pub trait ArtifactStore: Send + Sync + Debug {
    /// Opens an existing artifact for reading.
    fn open_reader(&self, path: &Path) -> Result<Box<dyn EventReader>, ResourceOpenError>;

    /// Creates (or truncates) an artifact for writing.
    fn create_writer(&self, path: &Path) -> Result<Box<dyn EventWriter>, ResourceOpenError>;
}
