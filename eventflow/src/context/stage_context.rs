//! The per-call context handed to every stage.

use super::RunIdentity;
use crate::core::Event;
use crate::errors::{EventflowError, Result};
use crate::io::EventWriter;
use crate::statistics::Statistics;

/// Everything a stage may touch while it is being driven.
///
/// The context borrows the run's single statistics container and, when one
/// is open, the writer of the enclosing host. Hosts build a fresh context for
/// their children so that each child writes to the nearest enclosing output.
pub struct StageContext<'a> {
    identity: &'a RunIdentity,
    statistics: &'a mut Statistics,
    output: Option<&'a mut dyn EventWriter>,
}

impl<'a> StageContext<'a> {
    /// Creates a context without an output.
    #[must_use]
    pub fn new(identity: &'a RunIdentity, statistics: &'a mut Statistics) -> Self {
        Self {
            identity,
            statistics,
            output: None,
        }
    }

    /// Attaches an output writer.
    #[must_use]
    pub fn with_output(mut self, output: Option<&'a mut dyn EventWriter>) -> Self {
        self.output = output;
        self
    }

    /// The identity of the run being driven.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        self.identity
    }

    /// The run statistics.
    #[must_use]
    pub fn statistics(&self) -> &Statistics {
        self.statistics
    }

    /// Mutable access to the run statistics.
    pub fn statistics_mut(&mut self) -> &mut Statistics {
        self.statistics
    }

    /// Returns true if an output writer is attached.
    #[must_use]
    pub fn has_output(&self) -> bool {
        self.output.as_ref().is_some_and(|w| w.is_open())
    }

    /// Writes an event to the attached output.
    ///
    /// # Errors
    ///
    /// Fails if no output is attached or the writer rejects the event.
    pub fn write(&mut self, event: &Event) -> Result<()> {
        match self.output.as_deref_mut() {
            Some(writer) => writer.write(event),
            None => Err(EventflowError::Internal(format!(
                "run '{}' has no open output",
                self.identity.label
            ))),
        }
    }

    /// Builds a child context sharing identity and statistics.
    ///
    /// `own_output` replaces the inherited writer when present.
    pub fn scoped<'b>(&'b mut self, own_output: Option<&'b mut dyn EventWriter>) -> StageContext<'b> {
        let output: Option<&'b mut dyn EventWriter> = match own_output {
            Some(writer) => Some(writer),
            None => match self.output.as_mut() {
                Some(inherited) => Some(&mut **inherited),
                None => None,
            },
        };
        StageContext {
            identity: self.identity,
            statistics: &mut *self.statistics,
            output,
        }
    }
}

impl std::fmt::Debug for StageContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("identity", &self.identity)
            .field("has_output", &self.output.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ArtifactStore, MemoryStore};
    use std::path::Path;

    #[test]
    fn test_write_without_output_fails() {
        let identity = RunIdentity::new("pos1", 0);
        let mut stats = Statistics::new();
        let mut ctx = StageContext::new(&identity, &mut stats);
        assert!(!ctx.has_output());
        assert!(ctx.write(&Event::new(0, serde_json::Value::Null)).is_err());
    }

    #[test]
    fn test_scoped_context_prefers_own_output() {
        let store = MemoryStore::new();
        let mut outer = store.create_writer(Path::new("outer.root")).unwrap();
        let mut inner = store.create_writer(Path::new("inner.root")).unwrap();

        let identity = RunIdentity::new("pos1", 0);
        let mut stats = Statistics::new();
        let mut ctx = StageContext::new(&identity, &mut stats).with_output(Some(outer.as_mut()));

        {
            let mut child = ctx.scoped(Some(inner.as_mut()));
            child.write(&Event::new(1, serde_json::Value::Null)).unwrap();
            child.statistics_mut().increment("seen");
        }
        {
            let mut child = ctx.scoped(None);
            child.write(&Event::new(2, serde_json::Value::Null)).unwrap();
        }

        assert_eq!(ctx.statistics().count("seen"), 1);
        assert_eq!(store.artifact("inner.root").unwrap().events[0].number, 1);
        assert_eq!(store.artifact("outer.root").unwrap().events[0].number, 2);
    }
}
