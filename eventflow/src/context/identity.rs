//! Run identity for correlating logs, events and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one run within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique ID generated for this execution.
    pub run_id: Uuid,
    /// The run label from the configuration.
    pub label: String,
    /// Position of the run in the configured batch.
    pub index: usize,
    /// When the identity was created.
    pub created_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a new identity with a generated run ID.
    #[must_use]
    pub fn new(label: impl Into<String>, index: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            label: label.into(),
            index,
            created_at: Utc::now(),
        }
    }

    /// Converts to a JSON value suitable for event payloads.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id.to_string(),
            "label": self.label,
            "index": self.index,
        })
    }
}

impl std::fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{} ({})", self.label, self.index, self.run_id)
    }
}
