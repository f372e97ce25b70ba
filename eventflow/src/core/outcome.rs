//! Per-event stage outcomes.

use super::Event;
use serde::{Deserialize, Serialize};

/// A recoverable, per-event data-quality issue.
///
/// Skips never escalate: the host counts them and moves on to the next event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSkipped {
    /// The stage that declared the event unusable.
    pub stage: String,
    /// Number of the skipped event.
    pub event: u64,
    /// Why the event was skipped.
    pub reason: String,
}

impl EventSkipped {
    /// Creates a new skip record.
    #[must_use]
    pub fn new(stage: impl Into<String>, event: u64, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            event,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for EventSkipped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "event {} skipped by '{}': {}",
            self.event, self.stage, self.reason
        )
    }
}

/// What a stage did with the event it was given.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// The event (possibly transformed) continues to the next stage.
    Pass(Event),
    /// The event is unusable; later stages in the same chain do not see it.
    Skip(EventSkipped),
}

impl EventOutcome {
    /// Creates a skip outcome.
    #[must_use]
    pub fn skip(stage: impl Into<String>, event: u64, reason: impl Into<String>) -> Self {
        Self::Skip(EventSkipped::new(stage, event, reason))
    }

    /// Returns true if the event was skipped.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip(_))
    }

    /// Returns the passed event, if any.
    #[must_use]
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Pass(event) => Some(event),
            Self::Skip(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_outcome() {
        let outcome = EventOutcome::skip("charge", 4, "bad charge");
        assert!(outcome.is_skip());
        if let EventOutcome::Skip(ref skipped) = outcome {
            assert_eq!(skipped.to_string(), "event 4 skipped by 'charge': bad charge");
        }
        assert!(outcome.into_event().is_none());
    }

    #[test]
    fn test_pass_outcome() {
        let outcome = EventOutcome::Pass(Event::new(1, serde_json::Value::Null));
        assert!(!outcome.is_skip());
        assert_eq!(outcome.into_event().map(|e| e.number), Some(1));
    }
}
