//! Span helpers for run execution.
//!
//! Every run executes inside a `run` span carrying its id and label, so
//! records from concurrent runs stay attributable.

use crate::context::RunIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::Span;

/// Attributes describing one finished run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSpanAttributes {
    /// Run ID.
    pub run_id: String,
    /// Run label.
    pub label: String,
    /// Final status.
    pub status: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Events that went through the stage chain.
    pub events_processed: Option<u64>,
    /// Events skipped by a stage.
    pub events_skipped: Option<u64>,
    /// Error message if failed.
    pub error: Option<String>,
}

impl RunSpanAttributes {
    /// Creates attributes for the given run.
    #[must_use]
    pub fn new(identity: &RunIdentity) -> Self {
        Self {
            run_id: identity.run_id.to_string(),
            label: identity.label.clone(),
            ..Default::default()
        }
    }

    /// Sets the run status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the event counts.
    #[must_use]
    pub fn with_counts(mut self, processed: u64, skipped: u64) -> Self {
        self.events_processed = Some(processed);
        self.events_skipped = Some(skipped);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Flattens into dotted attribute names.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        attrs.insert("run.id".to_string(), self.run_id.clone());
        attrs.insert("run.label".to_string(), self.label.clone());

        if let Some(ref v) = self.status {
            attrs.insert("run.status".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("run.duration_ms".to_string(), v.to_string());
        }
        if let Some(v) = self.events_processed {
            attrs.insert("run.events_processed".to_string(), v.to_string());
        }
        if let Some(v) = self.events_skipped {
            attrs.insert("run.events_skipped".to_string(), v.to_string());
        }
        if let Some(ref v) = self.error {
            attrs.insert("run.error".to_string(), v.clone());
        }
        attrs
    }

    /// Converts to a JSON value for event payloads.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Creates the `run` span for one run.
#[must_use]
pub fn run_span(identity: &RunIdentity) -> Span {
    tracing::info_span!(
        "run",
        run_id = %identity.run_id,
        label = %identity.label,
        index = identity.index
    )
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_attributes() {
        let identity = RunIdentity::new("pos1", 0);
        let attrs = RunSpanAttributes::new(&identity)
            .with_status("completed")
            .with_counts(10, 2)
            .with_duration_ms(12.5);

        let flat = attrs.to_attributes();
        assert_eq!(flat.get("run.label"), Some(&"pos1".to_string()));
        assert_eq!(flat.get("run.events_skipped"), Some(&"2".to_string()));
        assert_eq!(flat.get("run.duration_ms"), Some(&"12.5".to_string()));
        assert!(!flat.contains_key("run.error"));
        assert_eq!(attrs.to_value()["status"], "completed");
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("run");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(timer.name(), "run");
        assert!(timer.finish() >= 5.0);
    }
}
