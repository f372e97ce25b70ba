//! Run and batch reports.

use crate::context::RunIdentity;
use crate::core::RunStatus;
use crate::errors::TeardownFailure;
use crate::observability::RunSpanAttributes;
use crate::statistics::{Statistics, StatisticsReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Outcome of one pass (one root host) of a run.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Name of the root host.
    pub host: String,
    /// Resolved input artifact or scope directory.
    pub input: Option<PathBuf>,
    /// Resolved output artifact.
    pub output: Option<PathBuf>,
    /// Statistics the pass produced.
    pub statistics: Statistics,
}

/// Outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identity of the run.
    pub identity: RunIdentity,
    /// Final status.
    pub status: RunStatus,
    /// One entry per pass that got past `init`, in order.
    pub passes: Vec<PassReport>,
    /// Message of the error that ended the run, if any.
    pub error: Option<String>,
    /// Class of that error (see [`EventflowError::kind`](crate::errors::EventflowError::kind)).
    pub error_kind: Option<String>,
    /// Failures collected while releasing resources.
    pub teardown: Vec<TeardownFailure>,
    /// Statistics of every pass folded together.
    pub statistics: Statistics,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub ended_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Creates an empty completed report.
    #[must_use]
    pub fn new(identity: RunIdentity) -> Self {
        let now = Utc::now();
        Self {
            identity,
            status: RunStatus::Completed,
            passes: Vec::new(),
            error: None,
            error_kind: None,
            teardown: Vec::new(),
            statistics: Statistics::new(),
            started_at: now,
            ended_at: now,
            duration_ms: 0.0,
        }
    }

    /// Creates a failed report for a run that never reached its executor.
    #[must_use]
    pub fn failed(identity: RunIdentity, kind: &str, message: impl Into<String>) -> Self {
        let mut report = Self::new(identity);
        report.status = RunStatus::Failed;
        report.error = Some(message.into());
        report.error_kind = Some(kind.to_string());
        report
    }

    /// The run label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.identity.label
    }

    /// Returns true if the run completed without a fatal error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Events of the source that went through the first pass.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.passes
            .first()
            .map_or(0, |pass| pass.statistics.events_processed())
    }

    /// Events skipped by any stage of any pass.
    #[must_use]
    pub fn events_skipped(&self) -> u64 {
        self.statistics.events_skipped()
    }

    /// Events of the source dropped by the selection bounds.
    #[must_use]
    pub fn events_discarded(&self) -> u64 {
        self.passes
            .first()
            .map_or(0, |pass| pass.statistics.events_discarded())
    }

    /// Output artifacts of every pass.
    #[must_use]
    pub fn outputs(&self) -> Vec<&Path> {
        self.passes
            .iter()
            .filter_map(|pass| pass.output.as_deref())
            .collect()
    }

    /// Span attributes describing this run.
    #[must_use]
    pub fn attributes(&self) -> RunSpanAttributes {
        let attrs = RunSpanAttributes::new(&self.identity)
            .with_status(self.status.to_string())
            .with_duration_ms(self.duration_ms)
            .with_counts(self.events_processed(), self.events_skipped());
        match &self.error {
            Some(error) => attrs.with_error(error.clone()),
            None => attrs,
        }
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// One report per configured run, in configuration order.
    pub runs: Vec<RunReport>,
    /// Statistics aggregated across all runs.
    pub statistics: StatisticsReport,
}

impl BatchSummary {
    /// Builds a summary, merging every run's statistics.
    #[must_use]
    pub fn from_runs(runs: Vec<RunReport>) -> Self {
        let mut statistics = StatisticsReport::new();
        for run in &runs {
            statistics.merge(run.label(), &run.statistics);
        }
        Self { runs, statistics }
    }

    /// Returns true if no run failed. Cancelled runs do not count as failures.
    #[must_use]
    pub fn success(&self) -> bool {
        self.runs_failed() == 0
    }

    /// Number of runs.
    #[must_use]
    pub fn runs_total(&self) -> usize {
        self.runs.len()
    }

    /// Number of failed runs.
    #[must_use]
    pub fn runs_failed(&self) -> usize {
        self.count(RunStatus::Failed)
    }

    /// Number of cancelled runs.
    #[must_use]
    pub fn runs_cancelled(&self) -> usize {
        self.count(RunStatus::Cancelled)
    }

    /// Skipped-event count per run label.
    #[must_use]
    pub fn skipped_per_run(&self) -> BTreeMap<String, u64> {
        self.runs
            .iter()
            .map(|run| (run.label().to_string(), run.events_skipped()))
            .collect()
    }

    /// The report of the run with the given label.
    #[must_use]
    pub fn run(&self, label: &str) -> Option<&RunReport> {
        self.runs.iter().find(|run| run.label() == label)
    }

    /// Process exit code: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success())
    }

    fn count(&self, status: RunStatus) -> usize {
        self.runs.iter().filter(|run| run.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::{EVENTS_PROCESSED, EVENTS_SKIPPED};
    use pretty_assertions::assert_eq;

    fn report(label: &str, status: RunStatus, processed: f64, skipped: f64) -> RunReport {
        let mut stats = Statistics::new();
        stats.add(EVENTS_PROCESSED, processed);
        stats.add(EVENTS_SKIPPED, skipped);
        let mut report = RunReport::new(RunIdentity::new(label, 0));
        report.status = status;
        report.passes.push(PassReport {
            host: "reco".into(),
            input: None,
            output: Some(PathBuf::from(format!("{label}.reco.root"))),
            statistics: stats.clone(),
        });
        report.statistics = stats;
        report
    }

    #[test]
    fn test_cancelled_runs_are_not_failures() {
        let summary = BatchSummary::from_runs(vec![
            report("a", RunStatus::Completed, 5.0, 1.0),
            report("b", RunStatus::Cancelled, 2.0, 0.0),
        ]);
        assert!(summary.success());
        assert_eq!(summary.runs_cancelled(), 1);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_failed_run_sets_exit_code() {
        let summary = BatchSummary::from_runs(vec![
            report("a", RunStatus::Completed, 5.0, 1.0),
            report("b", RunStatus::Failed, 3.0, 2.0),
        ]);
        assert!(!summary.success());
        assert_eq!(summary.runs_failed(), 1);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(
            summary.skipped_per_run(),
            BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)])
        );
        assert_eq!(summary.statistics.runs, 2);
        assert!((summary.statistics.counter(EVENTS_PROCESSED) - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_run_report_accessors() {
        let run = report("pos1", RunStatus::Completed, 4.0, 1.0);
        assert_eq!(run.events_processed(), 4);
        assert_eq!(run.outputs(), vec![Path::new("pos1.reco.root")]);
        let attrs = run.attributes().to_attributes();
        assert_eq!(attrs.get("run.status"), Some(&"completed".to_string()));

        let failed = RunReport::failed(RunIdentity::new("x", 1), "Internal", "worker panicked");
        assert!(!failed.is_success());
        assert_eq!(failed.events_processed(), 0);
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let summary = BatchSummary::default();
        assert!(summary.success());
        assert_eq!(summary.runs_total(), 0);
    }
}
