//! The event value flowing through a stage chain.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One unit of input data processed by a stage chain.
///
/// Events are numbered from zero in input order. The payload is opaque to
/// the executor: stages interpret it, the persistence layer stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Position of the event in its input, starting at zero.
    pub number: u64,

    /// The event payload.
    pub payload: serde_json::Value,

    /// Annotations added by stages (e.g. a computed charge).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(number: u64, payload: serde_json::Value) -> Self {
        Self {
            number,
            payload,
            annotations: HashMap::new(),
        }
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.annotations.insert(key.into(), value);
        self
    }

    /// Sets an annotation in place.
    pub fn annotate(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.annotations.insert(key.into(), value);
    }

    /// Gets an annotation.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&serde_json::Value> {
        self.annotations.get(key)
    }

    /// Looks up a top-level field of an object payload.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }
}
