//! Data-quality filtering.
//!
//! A [`QualityFilterStage`] runs a check on every event. Events failing the
//! check are skipped and counted, optionally copied to a rejected-events
//! artifact, and the stage records a processed/skipped summary at terminate.

use super::{LifecycleGuard, Stage};
use crate::context::StageContext;
use crate::core::{Event, EventOutcome};
use crate::errors::{Result, StageInitError};
use crate::host::resolve_artifact_path;
use crate::io::{ArtifactStore, EventWriter};
use crate::options::RunOptions;
use crate::statistics::StageSummary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Check applied to each event; `Err` carries the rejection reason.
pub type QualityCheck = Box<dyn Fn(&Event) -> std::result::Result<(), String> + Send>;

struct RejectedArtifact {
    store: Arc<dyn ArtifactStore>,
    kind: String,
    path: Option<PathBuf>,
    writer: Option<Box<dyn EventWriter>>,
}

/// Skips events that fail a data-quality check.
pub struct QualityFilterStage {
    name: String,
    check: QualityCheck,
    rejected: Option<RejectedArtifact>,
    guard: LifecycleGuard,
    processed: u64,
    skipped: u64,
}

impl QualityFilterStage {
    /// Creates a filter with the given check.
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Event) -> std::result::Result<(), String> + Send + 'static,
    {
        let name = name.into();
        Self {
            guard: LifecycleGuard::new(name.clone()),
            name,
            check: Box::new(check),
            rejected: None,
            processed: 0,
            skipped: 0,
        }
    }

    /// Copies rejected events to a `<base>.<kind>.root` artifact next to the
    /// run output.
    #[must_use]
    pub fn with_rejected_artifact(
        mut self,
        store: Arc<dyn ArtifactStore>,
        kind: impl Into<String>,
    ) -> Self {
        self.rejected = Some(RejectedArtifact {
            store,
            kind: kind.into(),
            path: None,
            writer: None,
        });
        self
    }

    /// Path of the rejected-events artifact once initialized.
    #[must_use]
    pub fn rejected_path(&self) -> Option<&Path> {
        self.rejected.as_ref().and_then(|r| r.path.as_deref())
    }

    /// Events checked so far.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Events rejected so far.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

fn artifact_dir(options: &RunOptions) -> Option<String> {
    if let Some(output) = options.output_file() {
        return Path::new(output)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.to_string_lossy().into_owned());
    }
    options.output_dir().map(str::to_string)
}

impl Stage for QualityFilterStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, options: &RunOptions, _ctx: &mut StageContext<'_>) -> Result<()> {
        self.guard.check_init()?;
        self.processed = 0;
        self.skipped = 0;

        if let Some(rejected) = self.rejected.as_mut() {
            let dir = artifact_dir(options);
            let path = resolve_artifact_path(options.input_file(), &rejected.kind, dir.as_deref());
            let writer = rejected
                .store
                .create_writer(&path)
                .map_err(|err| StageInitError::auxiliary(self.name.clone(), err))?;
            rejected.path = Some(path);
            rejected.writer = Some(writer);
        }

        self.guard.initialized();
        Ok(())
    }

    fn exec(&mut self, event: Event, _ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        self.guard.check_exec()?;
        self.processed += 1;

        match (self.check)(&event) {
            Ok(()) => Ok(EventOutcome::Pass(event)),
            Err(reason) => {
                self.skipped += 1;
                warn!(stage = %self.name, event = event.number, %reason, "Event failed quality check");
                if let Some(writer) = self.rejected.as_mut().and_then(|r| r.writer.as_mut()) {
                    let rejected = event.clone().with_annotation(
                        "rejected_by",
                        serde_json::json!({ "stage": self.name, "reason": reason }),
                    );
                    writer.write(&rejected)?;
                }
                Ok(EventOutcome::skip(self.name.clone(), event.number, reason))
            }
        }
    }

    fn terminate(&mut self, ctx: &mut StageContext<'_>) -> Result<()> {
        self.guard.terminate()?;

        let summary = StageSummary::new(self.name.clone(), self.processed, self.skipped);
        info!(
            stage = %self.name,
            processed = summary.processed,
            skipped = summary.skipped,
            good_percent = summary.good_percent(),
            "Quality filter summary"
        );
        ctx.statistics_mut().record_summary(summary);

        if let Some(mut writer) = self.rejected.as_mut().and_then(|r| r.writer.take()) {
            writer.close()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for QualityFilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityFilterStage")
            .field("name", &self.name)
            .field("state", &self.guard.state())
            .field("processed", &self.processed)
            .field("skipped", &self.skipped)
            .field("rejected_path", &self.rejected_path())
            .finish()
    }
}
