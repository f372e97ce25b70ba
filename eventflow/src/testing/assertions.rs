//! Assertions over run reports and in-memory artifacts.

use crate::core::RunStatus;
use crate::io::MemoryStore;
use crate::pipeline::RunReport;
use std::path::Path;

/// Asserts that the run completed.
pub fn assert_run_completed(report: &RunReport) {
    assert_eq!(
        report.status,
        RunStatus::Completed,
        "Expected run '{}' to complete, got error: {:?}",
        report.label(),
        report.error
    );
}

/// Asserts that the run failed with the given error kind.
pub fn assert_run_failed(report: &RunReport, kind: &str) {
    assert_eq!(
        report.status,
        RunStatus::Failed,
        "Expected run '{}' to fail",
        report.label()
    );
    assert_eq!(
        report.error_kind.as_deref(),
        Some(kind),
        "Unexpected error for run '{}': {:?}",
        report.label(),
        report.error
    );
}

/// Asserts that the run was cancelled.
pub fn assert_run_cancelled(report: &RunReport) {
    assert_eq!(
        report.status,
        RunStatus::Cancelled,
        "Expected run '{}' to be cancelled, got {:?}",
        report.label(),
        report.error
    );
}

/// Asserts the processed and skipped counts of a run.
pub fn assert_counts(report: &RunReport, processed: u64, skipped: u64) {
    assert_eq!(
        (report.events_processed(), report.events_skipped()),
        (processed, skipped),
        "Unexpected (processed, skipped) for run '{}'",
        report.label()
    );
}

/// Asserts that the artifact at `path` exists and was closed exactly once.
pub fn assert_closed_once(store: &MemoryStore, path: impl AsRef<Path>) {
    let path = path.as_ref();
    let artifact = store
        .artifact(path)
        .unwrap_or_else(|| panic!("No artifact at '{}'", path.display()));
    assert_eq!(
        artifact.closes,
        1,
        "Artifact '{}' closed {} times",
        path.display(),
        artifact.closes
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunIdentity;

    #[test]
    fn test_assert_run_failed() {
        let report = RunReport::failed(RunIdentity::new("a", 0), "InternalError", "panic");
        assert_run_failed(&report, "InternalError");
        assert_counts(&report, 0, 0);
    }

    #[test]
    #[should_panic(expected = "to complete")]
    fn test_assert_run_completed_panics_on_failure() {
        let report = RunReport::failed(RunIdentity::new("a", 0), "InternalError", "panic");
        assert_run_completed(&report);
    }

    #[test]
    #[should_panic(expected = "No artifact")]
    fn test_assert_closed_once_missing() {
        assert_closed_once(&MemoryStore::new(), "out/x.root");
    }
}
