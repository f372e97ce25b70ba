//! Cross-run aggregation of finished statistics.

use super::{StageSummary, Statistics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics combined across every finished run of a batch.
///
/// Merging only happens after runs complete. Counters are summed, values and
/// stage summaries are kept per run label, so the result does not depend on
/// the order in which runs are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    /// Summed counters.
    pub counters: BTreeMap<String, f64>,
    /// Named values per run label.
    pub values: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    /// Stage summaries per run label.
    pub summaries: BTreeMap<String, Vec<StageSummary>>,
    /// Number of runs merged.
    pub runs: usize,
}

impl StatisticsReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates one run's statistics under its label.
    pub fn merge(&mut self, run_label: &str, stats: &Statistics) {
        for (name, value) in stats.counters() {
            *self.counters.entry(name.clone()).or_insert(0.0) += value;
        }
        if !stats.values().is_empty() {
            self.values
                .entry(run_label.to_string())
                .or_default()
                .extend(stats.values().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if !stats.summaries().is_empty() {
            self.summaries
                .entry(run_label.to_string())
                .or_default()
                .extend(stats.summaries().iter().cloned());
        }
        self.runs += 1;
    }

    /// Reads a summed counter; missing counters read as zero.
    #[must_use]
    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }
}
