//! The per-run event loop.

use super::summary::{PassReport, RunReport};
use crate::cancellation::CancellationToken;
use crate::context::{RunIdentity, StageContext};
use crate::core::{EventOutcome, RunStatus};
use crate::errors::{EventflowError, Result, TeardownError};
use crate::host::StageHost;
use crate::observability::{run_span, SpanTimer};
use crate::options::RunOptions;
use crate::stages::Stage;
use crate::statistics::{Statistics, EVENTS_DISCARDED, EVENTS_PROCESSED, EVENTS_SKIPPED};
use chrono::Utc;
use tracing::{debug, error, info, warn};

/// Drives one run: every pass of its stage tree under one set of options.
#[derive(Debug)]
pub struct RunExecutor {
    identity: RunIdentity,
    options: RunOptions,
    passes: Vec<StageHost>,
    token: CancellationToken,
}

struct PassOutcome {
    report: Option<PassReport>,
    error: Option<EventflowError>,
    teardown: TeardownError,
}

impl RunExecutor {
    /// Creates an executor for the given passes.
    #[must_use]
    pub fn new(identity: RunIdentity, options: RunOptions, passes: Vec<StageHost>) -> Self {
        Self {
            identity,
            options,
            passes,
            token: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop the run between events.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// The run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Runs every pass in order and reports the outcome.
    ///
    /// Never returns an error: fatal problems end up in the report. A fatal
    /// error in one pass skips the remaining passes.
    pub fn execute(self) -> RunReport {
        let Self {
            identity,
            options,
            passes,
            token,
        } = self;
        let span = run_span(&identity);
        let _entered = span.enter();
        let timer = SpanTimer::start("run");

        let mut report = RunReport::new(identity.clone());
        info!(input = options.input_file(), passes = passes.len(), "Run started");

        for mut host in passes {
            let outcome = run_pass(&identity, &options, &token, &mut host);
            if let Some(pass) = outcome.report {
                if report.passes.is_empty() {
                    report.statistics.absorb(&pass.statistics);
                } else {
                    report.statistics.absorb_pass(&pass.statistics);
                }
                report.passes.push(pass);
            }
            report.teardown.extend(outcome.teardown.failures.iter().cloned());

            let error = match (outcome.error, outcome.teardown.is_empty()) {
                (Some(error), _) => error,
                (None, false) => outcome.teardown.into(),
                (None, true) => continue,
            };
            report.status = if error.is_cancellation() {
                RunStatus::Cancelled
            } else {
                RunStatus::Failed
            };
            report.error_kind = Some(error.kind().to_string());
            report.error = Some(error.to_string());
            break;
        }

        report.ended_at = Utc::now();
        report.duration_ms = timer.finish();

        match report.status {
            RunStatus::Completed => info!(
                processed = report.events_processed(),
                skipped = report.events_skipped(),
                duration_ms = report.duration_ms,
                "Run completed"
            ),
            RunStatus::Cancelled => warn!(
                processed = report.events_processed(),
                reason = report.error.as_deref().unwrap_or_default(),
                "Run cancelled"
            ),
            RunStatus::Failed => error!(
                processed = report.events_processed(),
                error = report.error.as_deref().unwrap_or_default(),
                "Run failed"
            ),
        }
        report
    }
}

fn run_pass(
    identity: &RunIdentity,
    options: &RunOptions,
    token: &CancellationToken,
    host: &mut StageHost,
) -> PassOutcome {
    let mut stats = Statistics::new();
    for name in [EVENTS_PROCESSED, EVENTS_SKIPPED, EVENTS_DISCARDED] {
        stats.create_counter(name);
    }
    let mut ctx = StageContext::new(identity, &mut stats);

    if let Err(error) = host.init(options, &mut ctx) {
        return PassOutcome {
            report: None,
            error: Some(error),
            teardown: host.take_cleanup_failures(),
        };
    }

    let error = event_loop(options, token, host, &mut ctx).err();
    let teardown = match host.terminate(&mut ctx) {
        Ok(()) => TeardownError::new(),
        Err(EventflowError::Teardown(teardown)) => teardown,
        Err(other) => TeardownError::single(host.name(), other.to_string()),
    };

    let report = PassReport {
        host: host.name().to_string(),
        input: host.input_path().map(std::path::Path::to_path_buf),
        output: host.output_path(),
        statistics: stats,
    };
    PassOutcome {
        report: Some(report),
        error,
        teardown,
    }
}

fn event_loop(
    options: &RunOptions,
    token: &CancellationToken,
    host: &mut StageHost,
    ctx: &mut StageContext<'_>,
) -> Result<()> {
    loop {
        token.check()?;
        let Some(event) = host.next_event()? else {
            break;
        };
        let number = event.number;
        if options.is_past_last(number) {
            debug!(event = number, "Reached last selected event");
            break;
        }
        if !options.selects(number) {
            ctx.statistics_mut().increment(EVENTS_DISCARDED);
            continue;
        }

        if let EventOutcome::Skip(skipped) = host.exec(event, ctx)? {
            debug!(%skipped, "Event skipped");
            ctx.statistics_mut().increment(EVENTS_SKIPPED);
        }
        ctx.statistics_mut().increment(EVENTS_PROCESSED);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStore;
    use crate::stages::WriteEventStage;
    use crate::testing::{call_log, FailPhase, FailingStage, RecordingStage, SkipNumbersStage};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn store(events: u64) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_numbered("in/pos1.root", events);
        store
    }

    fn executor(passes: Vec<StageHost>, options: RunOptions) -> RunExecutor {
        RunExecutor::new(RunIdentity::new("pos1", 0), options, passes)
    }

    #[test]
    fn test_counts_skips() {
        let store = store(10);
        let host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(SkipNumbersStage::new("quality", [2, 5, 7]))
            .with_stage(WriteEventStage::default());

        let report = executor(vec![host], RunOptions::new("in/pos1.txt")).execute();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.events_processed(), 10);
        assert_eq!(report.events_skipped(), 3);
        let artifact = store.artifact("in/pos1.reco.root").unwrap();
        assert_eq!(artifact.events.len(), 7);
        assert_eq!(artifact.statistics.unwrap().events_skipped(), 3);
    }

    #[test]
    fn test_abort_stops_loop_and_releases() {
        let store = store(10);
        let log = call_log();
        let host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(FailingStage::new("strict", FailPhase::Exec(4)))
            .with_stage(RecordingStage::new("after", log.clone()));

        let report = executor(vec![host], RunOptions::new("in/pos1.txt")).execute();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.error_kind.as_deref(), Some("StageExecError"));
        assert_eq!(report.events_processed(), 4);
        assert!(log.lock().contains(&"after.terminate".to_string()));
        assert_eq!(store.reader_counts(), (1, 1));
        assert_eq!(store.artifact("in/pos1.reco.root").unwrap().closes, 1);
    }

    #[test]
    fn test_selection_bounds() {
        let store = store(10);
        let host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(WriteEventStage::default());
        let options = RunOptions::new("in/pos1.txt").with_bounds(Some(3), Some(6));

        let report = executor(vec![host], options).execute();

        assert_eq!(report.events_processed(), 4);
        assert_eq!(report.events_discarded(), 3);
        let numbers: Vec<u64> = store
            .artifact("in/pos1.reco.root")
            .unwrap()
            .events
            .iter()
            .map(|e| e.number)
            .collect();
        assert_eq!(numbers, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let store = store(5);
        let token = CancellationToken::new();
        token.cancel("operator");
        let host = StageHost::new("reco", Arc::new(store.clone())).with_kinds("", "reco");

        let report = executor(vec![host], RunOptions::new("in/pos1.txt"))
            .with_cancellation(token)
            .execute();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.events_processed(), 0);
        assert_eq!(store.artifact("in/pos1.reco.root").unwrap().closes, 1);
    }

    #[test]
    fn test_passes_chain_artifacts() {
        let store = store(6);
        let reco = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(SkipNumbersStage::new("quality", [0]))
            .with_stage(WriteEventStage::default());
        let calib = StageHost::new("calib", Arc::new(store.clone()))
            .with_kinds("reco", "calib")
            .with_stage(WriteEventStage::default());

        let report = executor(vec![reco, calib], RunOptions::new("in/pos1.txt")).execute();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.passes.len(), 2);
        assert_eq!(report.passes[1].input.as_deref(), Some(std::path::Path::new("in/pos1.reco.root")));
        assert_eq!(store.artifact("in/pos1.calib.root").unwrap().events.len(), 5);
        assert_eq!(report.events_processed(), 6);
        assert_eq!(report.events_skipped(), 1);
        assert_eq!(report.statistics.events_processed(), report.events_processed());
        assert_eq!(report.statistics.events_discarded(), 0);
    }

    #[test]
    fn test_failed_pass_stops_later_passes() {
        let store = MemoryStore::new();
        let reco = StageHost::new("reco", Arc::new(store.clone())).with_kinds("", "reco");
        let calib = StageHost::new("calib", Arc::new(store.clone())).with_kinds("reco", "calib");

        let report = executor(vec![reco, calib], RunOptions::new("in/missing.txt")).execute();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.error_kind.as_deref(), Some("ResourceOpenError"));
        assert!(report.passes.is_empty());
        assert!(store.paths().is_empty());
    }

    #[test]
    fn test_teardown_failure_fails_run() {
        let store = store(2);
        store.fail_close("in/pos1.reco.root");
        let host = StageHost::new("reco", Arc::new(store.clone())).with_kinds("", "reco");

        let report = executor(vec![host], RunOptions::new("in/pos1.txt")).execute();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.error_kind.as_deref(), Some("TeardownError"));
        assert_eq!(report.teardown.len(), 1);
        assert_eq!(report.events_processed(), 2);
    }
}
