//! Per-run statistics container.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

/// Counter incremented once per event that reached the stage chain.
pub const EVENTS_PROCESSED: &str = "events.processed";
/// Counter incremented once per event a stage declared unusable.
pub const EVENTS_SKIPPED: &str = "events.skipped";
/// Counter incremented once per event outside the selection bounds.
pub const EVENTS_DISCARDED: &str = "events.discarded";

/// Summary record a stage emits at terminate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    /// The stage name.
    pub stage: String,
    /// Events the stage was given.
    pub processed: u64,
    /// Events the stage skipped.
    pub skipped: u64,
}

impl StageSummary {
    /// Creates a new summary.
    #[must_use]
    pub fn new(stage: impl Into<String>, processed: u64, skipped: u64) -> Self {
        Self {
            stage: stage.into(),
            processed,
            skipped,
        }
    }

    /// Percentage of processed events that were good, or 100 when none were seen.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn good_percent(&self) -> f64 {
        if self.processed == 0 {
            return 100.0;
        }
        (self.processed.saturating_sub(self.skipped)) as f64 * 100.0 / self.processed as f64
    }
}

/// Named counters and values accumulated by the stages of one run.
///
/// One container exists per run. It is passed by mutable reference into every
/// stage call and is never shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    counters: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    summaries: Vec<StageSummary>,
}

impl Statistics {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a counter at zero if it does not exist yet.
    pub fn create_counter(&mut self, name: &str) {
        self.counters.entry(name.to_string()).or_insert(0.0);
    }

    /// Returns a mutable reference to a counter, creating it at zero.
    pub fn counter_mut(&mut self, name: &str) -> &mut f64 {
        self.counters.entry(name.to_string()).or_insert(0.0)
    }

    /// Adds `amount` to a counter.
    pub fn add(&mut self, name: &str, amount: f64) {
        *self.counter_mut(name) += amount;
    }

    /// Adds one to a counter.
    pub fn increment(&mut self, name: &str) {
        self.add(name, 1.0);
    }

    /// Reads a counter; missing counters read as zero.
    #[must_use]
    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }

    /// Reads a counter as a whole count.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count(&self, name: &str) -> u64 {
        self.counter(name).max(0.0) as u64
    }

    /// All counters in name order.
    #[must_use]
    pub fn counters(&self) -> &BTreeMap<String, f64> {
        &self.counters
    }

    /// Stores a named value for later stages of the same run.
    pub fn set_value(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.values.insert(name.into(), value);
    }

    /// Reads a named value as `T`.
    ///
    /// Missing values and type mismatches are logged and return `None`.
    #[must_use]
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let Some(raw) = self.values.get(name) else {
            error!(name, "Value not found in statistics");
            return None;
        };
        match serde_json::from_value(raw.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(name, error = %e, "Value in statistics has unexpected type");
                None
            }
        }
    }

    /// All named values.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.values
    }

    /// Records a stage summary.
    pub fn record_summary(&mut self, summary: StageSummary) {
        self.summaries.push(summary);
    }

    /// All stage summaries, in recording order.
    #[must_use]
    pub fn summaries(&self) -> &[StageSummary] {
        &self.summaries
    }

    /// Events that reached the stage chain.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.count(EVENTS_PROCESSED)
    }

    /// Events some stage skipped.
    #[must_use]
    pub fn events_skipped(&self) -> u64 {
        self.count(EVENTS_SKIPPED)
    }

    /// Events dropped by the selection bounds.
    #[must_use]
    pub fn events_discarded(&self) -> u64 {
        self.count(EVENTS_DISCARDED)
    }

    /// Folds another container into this one.
    ///
    /// Counters are summed, values from `other` replace existing ones and
    /// summaries are appended.
    pub fn absorb(&mut self, other: &Statistics) {
        self.absorb_except(other, &[]);
    }

    /// Folds a later pass of the same run into this one.
    ///
    /// Later passes re-read the source events, so `events.processed` and
    /// `events.discarded` keep the first pass's values.
    pub fn absorb_pass(&mut self, other: &Statistics) {
        self.absorb_except(other, &[EVENTS_PROCESSED, EVENTS_DISCARDED]);
    }

    fn absorb_except(&mut self, other: &Statistics, excluded: &[&str]) {
        for (name, value) in &other.counters {
            if excluded.contains(&name.as_str()) {
                continue;
            }
            *self.counter_mut(name) += value;
        }
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.summaries.extend(other.summaries.iter().cloned());
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.values.is_empty() && self.summaries.is_empty()
    }
}
