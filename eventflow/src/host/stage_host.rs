//! The stage host: ordered children plus the run's reader and writer.

use super::naming::{generate_name, resolve_artifact_path};
use crate::context::StageContext;
use crate::core::{Event, EventOutcome, LifecycleState};
use crate::errors::{EventflowError, ResourceOpenError, Result, TeardownError};
use crate::io::{ArtifactStore, EventReader, EventWriter, ScopeDirectoryReader};
use crate::options::{OptionKey, RunOptions};
use crate::stages::{LifecycleGuard, Stage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A stage that owns child stages and the I/O handles of one run.
///
/// A root host opens its input and creates its output at `init`, forwards
/// each event to its children in declared order, and at `terminate`
/// finalizes every child, flushes the run statistics into its output and
/// closes both handles. A nested host has no input of its own: it receives
/// events from its parent and only owns an output.
pub struct StageHost {
    name: String,
    nested: bool,
    input_kind: Option<String>,
    output_kind: Option<String>,
    store: Arc<dyn ArtifactStore>,
    children: Vec<Box<dyn Stage>>,
    reader: Option<Box<dyn EventReader>>,
    writer: Option<Box<dyn EventWriter>>,
    resolved: Option<RunOptions>,
    input_path: Option<PathBuf>,
    guard: LifecycleGuard,
    initialized_children: usize,
    cleanup_failures: TeardownError,
}

impl StageHost {
    /// Creates a root host whose artifact kinds come from the run options.
    #[must_use]
    pub fn new(name: impl Into<String>, store: Arc<dyn ArtifactStore>) -> Self {
        let name = name.into();
        Self {
            guard: LifecycleGuard::new(name.clone()),
            name,
            nested: false,
            input_kind: None,
            output_kind: None,
            store,
            children: Vec::new(),
            reader: None,
            writer: None,
            resolved: None,
            input_path: None,
            initialized_children: 0,
            cleanup_failures: TeardownError::new(),
        }
    }

    /// Creates a host nested inside another host, writing its own `output_kind` artifact.
    #[must_use]
    pub fn nested(
        name: impl Into<String>,
        store: Arc<dyn ArtifactStore>,
        output_kind: impl Into<String>,
    ) -> Self {
        let mut host = Self::new(name, store);
        host.nested = true;
        host.output_kind = Some(output_kind.into());
        host
    }

    /// Declares the input and output artifact kinds, overriding the run options.
    #[must_use]
    pub fn with_kinds(mut self, input_kind: impl Into<String>, output_kind: impl Into<String>) -> Self {
        self.input_kind = Some(input_kind.into());
        self.output_kind = Some(output_kind.into());
        self
    }

    /// Appends a child stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.children.push(Box::new(stage));
        self
    }

    /// Appends a boxed child stage.
    pub fn push(&mut self, stage: Box<dyn Stage>) {
        self.children.push(stage);
    }

    /// Number of child stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true if the host has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true for hosts that inherit events from a parent host.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// The host's lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.guard.state()
    }

    /// The options computed at `init`, including the resolved output file.
    #[must_use]
    pub fn resolved_options(&self) -> Option<&RunOptions> {
        self.resolved.as_ref()
    }

    /// The resolved input artifact, if this host opened one.
    #[must_use]
    pub fn input_path(&self) -> Option<&Path> {
        self.input_path.as_deref()
    }

    /// The resolved output artifact.
    #[must_use]
    pub fn output_path(&self) -> Option<PathBuf> {
        self.resolved
            .as_ref()
            .and_then(RunOptions::output_file)
            .map(PathBuf::from)
    }

    /// Takes the release failures recorded while unwinding a failed `init`.
    pub fn take_cleanup_failures(&mut self) -> TeardownError {
        std::mem::take(&mut self.cleanup_failures)
    }

    /// Reads the next input event.
    ///
    /// # Errors
    ///
    /// Fails if the host has no open input or the reader fails.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        self.guard.check_exec()?;
        match self.reader.as_mut() {
            Some(reader) => reader.next_event(),
            None => Err(EventflowError::lifecycle(
                self.name.clone(),
                "no input is open on this host",
            )),
        }
    }

    fn resolve(&self, options: &RunOptions) -> RunOptions {
        let input_kind = self
            .input_kind
            .clone()
            .unwrap_or_else(|| options.input_kind().to_string());
        let output_kind = self
            .output_kind
            .clone()
            .unwrap_or_else(|| options.output_kind().to_string());
        let output =
            resolve_artifact_path(options.input_file(), &output_kind, options.output_dir());

        options
            .clone()
            .with_kinds(input_kind, output_kind)
            .with(
                OptionKey::OutputFile,
                serde_json::json!(output.to_string_lossy()),
            )
    }

    fn input_artifact(resolved: &RunOptions) -> PathBuf {
        match resolved.input_kind() {
            "" => PathBuf::from(generate_name(resolved.input_file(), "")),
            kind => resolve_artifact_path(resolved.input_file(), kind, resolved.output_dir()),
        }
    }

    fn open_input(&mut self, resolved: &RunOptions) -> Result<(), ResourceOpenError> {
        if let (true, Some(scope)) = (resolved.input_kind().is_empty(), resolved.scope()) {
            self.input_path = Some(scope.directory.clone());
            self.reader = Some(Box::new(ScopeDirectoryReader::open(&scope)?));
            return Ok(());
        }

        let path = Self::input_artifact(resolved);
        self.reader = Some(self.store.open_reader(&path)?);
        self.input_path = Some(path);
        Ok(())
    }

    fn open_output(&mut self, resolved: &RunOptions) -> Result<(), ResourceOpenError> {
        let path = resolved
            .output_file()
            .map(PathBuf::from)
            .unwrap_or_default();
        if self.input_path.as_deref() == Some(path.as_path()) {
            return Err(ResourceOpenError::output(
                &path,
                "output artifact would overwrite the input",
            ));
        }
        self.writer = Some(self.store.create_writer(&path)?);
        Ok(())
    }

    fn release(&mut self, failures: &mut TeardownError) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.close() {
                warn!(host = %self.name, error = %e, "Failed to close output");
                failures.absorb(&format!("{}.output", self.name), e);
            }
        }
        if let Some(mut reader) = self.reader.take() {
            if let Err(e) = reader.close() {
                warn!(host = %self.name, error = %e, "Failed to close input");
                failures.absorb(&format!("{}.input", self.name), e);
            }
        }
    }

    fn terminate_children(&mut self, ctx: &mut StageContext<'_>, failures: &mut TeardownError) {
        let mut child_ctx = ctx.scoped(writer_ref(&mut self.writer));
        for child in self.children.iter_mut().take(self.initialized_children) {
            if let Err(e) = child.terminate(&mut child_ctx) {
                warn!(host = %self.name, stage = child.name(), error = %e, "Stage failed to terminate");
                failures.absorb(child.name(), e);
            }
        }
        self.initialized_children = 0;
    }

    fn abort_init(&mut self, ctx: &mut StageContext<'_>) {
        let mut failures = TeardownError::new();
        self.terminate_children(ctx, &mut failures);
        self.release(&mut failures);
        self.guard.force_terminated();
        self.cleanup_failures = failures;
    }
}

fn writer_ref(writer: &mut Option<Box<dyn EventWriter>>) -> Option<&mut dyn EventWriter> {
    match writer {
        Some(writer) => Some(writer.as_mut()),
        None => None,
    }
}

impl Stage for StageHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, options: &RunOptions, ctx: &mut StageContext<'_>) -> Result<()> {
        self.guard.check_init()?;
        let resolved = self.resolve(options);

        let opened = if self.nested {
            Ok(())
        } else {
            self.open_input(&resolved)
        };
        let opened = opened.and_then(|()| self.open_output(&resolved));
        if let Err(e) = opened {
            error!(host = %self.name, error = %e, "Failed to open run artifacts");
            self.abort_init(ctx);
            return Err(e.into());
        }

        info!(
            host = %self.name,
            input = ?self.input_path,
            output = resolved.output_file().unwrap_or_default(),
            "Opened run artifacts"
        );

        for idx in 0..self.children.len() {
            let mut child_ctx = ctx.scoped(writer_ref(&mut self.writer));
            let child = &mut self.children[idx];
            if let Err(e) = child.init(&resolved, &mut child_ctx) {
                error!(host = %self.name, stage = child.name(), error = %e, "Stage failed to initialize");
                drop(child_ctx);
                self.abort_init(ctx);
                return Err(e);
            }
            debug!(host = %self.name, stage = child.name(), "Stage initialized");
            self.initialized_children += 1;
        }

        self.resolved = Some(resolved);
        self.guard.initialized();
        Ok(())
    }

    fn exec(&mut self, event: Event, ctx: &mut StageContext<'_>) -> Result<EventOutcome> {
        self.guard.check_exec()?;
        let mut child_ctx = ctx.scoped(writer_ref(&mut self.writer));

        let mut current = event;
        for child in &mut self.children {
            match child.exec(current, &mut child_ctx)? {
                EventOutcome::Pass(next) => current = next,
                EventOutcome::Skip(skipped) => {
                    debug!(host = %self.name, %skipped, "Event skipped");
                    return Ok(EventOutcome::Skip(skipped));
                }
            }
        }
        Ok(EventOutcome::Pass(current))
    }

    fn terminate(&mut self, ctx: &mut StageContext<'_>) -> Result<()> {
        self.guard.terminate()?;
        let mut failures = TeardownError::new();

        self.terminate_children(ctx, &mut failures);

        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.write_statistics(ctx.statistics()) {
                warn!(host = %self.name, error = %e, "Failed to flush statistics");
                failures.absorb(&format!("{}.statistics", self.name), e);
            }
        }
        self.release(&mut failures);

        info!(host = %self.name, failures = failures.failures.len(), "Host terminated");
        failures.into_result()
    }
}

impl Drop for StageHost {
    fn drop(&mut self) {
        if self.reader.is_none() && self.writer.is_none() {
            return;
        }
        let mut failures = TeardownError::new();
        self.release(&mut failures);
        if !failures.is_empty() {
            warn!(host = %self.name, error = %failures, "Release on drop failed");
        }
    }
}

impl std::fmt::Debug for StageHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageHost")
            .field("name", &self.name)
            .field("nested", &self.nested)
            .field("state", &self.guard.state())
            .field("children", &self.children)
            .field("input_open", &self.reader.is_some())
            .field("output_open", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunIdentity;
    use crate::io::MemoryStore;
    use crate::statistics::Statistics;
    use crate::stages::{QualityFilterStage, WriteEventStage};
    use crate::testing::{call_log, FailPhase, FailingStage, RecordingStage, SkipNumbersStage};
    use pretty_assertions::assert_eq;

    fn store_with_input() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_numbered("in/pos1.root", 4);
        store
    }

    fn drive(host: &mut StageHost, options: &RunOptions) -> Result<Statistics> {
        let identity = RunIdentity::new("pos1", 0);
        let mut stats = Statistics::new();
        let mut ctx = StageContext::new(&identity, &mut stats);
        host.init(options, &mut ctx)?;
        while let Some(event) = host.next_event()? {
            host.exec(event, &mut ctx)?;
        }
        host.terminate(&mut ctx)?;
        Ok(stats)
    }

    #[test]
    fn test_resolves_and_writes_output() {
        let store = store_with_input();
        let mut host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(WriteEventStage::default());

        let stats = drive(&mut host, &RunOptions::new("in/pos1.txt")).unwrap();

        assert_eq!(host.input_path(), Some(Path::new("in/pos1.root")));
        assert_eq!(host.output_path(), Some(PathBuf::from("in/pos1.reco.root")));
        let artifact = store.artifact("in/pos1.reco.root").unwrap();
        assert_eq!(artifact.events.len(), 4);
        assert_eq!(artifact.closes, 1);
        assert_eq!(artifact.statistics, Some(stats));
        assert_eq!(store.reader_counts(), (1, 1));
        assert_eq!(host.state(), LifecycleState::Terminated);
    }

    #[test]
    fn test_missing_input_creates_no_output() {
        let store = MemoryStore::new();
        let mut host = StageHost::new("reco", Arc::new(store.clone())).with_kinds("", "reco");

        let err = drive(&mut host, &RunOptions::new("in/missing.txt")).unwrap_err();

        assert_eq!(err.kind(), "ResourceOpenError");
        assert!(store.paths().is_empty());
    }

    #[test]
    fn test_output_failure_closes_input() {
        let store = store_with_input();
        store.fail_create("in/pos1.reco.root");
        let mut host = StageHost::new("reco", Arc::new(store.clone())).with_kinds("", "reco");

        let err = drive(&mut host, &RunOptions::new("in/pos1.txt")).unwrap_err();

        assert_eq!(err.kind(), "ResourceOpenError");
        assert_eq!(store.reader_counts(), (1, 1));
    }

    #[test]
    fn test_output_may_not_overwrite_input() {
        let store = store_with_input();
        let mut host = StageHost::new("reco", Arc::new(store.clone())).with_kinds("", "");

        let err = drive(&mut host, &RunOptions::new("in/pos1.txt")).unwrap_err();
        assert_eq!(err.kind(), "ResourceOpenError");
        assert_eq!(store.artifact("in/pos1.root").unwrap().events.len(), 4);
    }

    #[test]
    fn test_child_init_failure_terminates_earlier_siblings() {
        let store = store_with_input();
        let log = call_log();
        let mut host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(RecordingStage::new("a", log.clone()))
            .with_stage(FailingStage::new("b", FailPhase::Init).with_log(log.clone()))
            .with_stage(RecordingStage::new("c", log.clone()));

        let err = drive(&mut host, &RunOptions::new("in/pos1.txt")).unwrap_err();

        assert_eq!(err.kind(), "StageInitError");
        assert_eq!(
            log.lock().clone(),
            vec!["a.init", "b.init", "a.terminate"]
        );
        assert_eq!(store.artifact("in/pos1.reco.root").unwrap().closes, 1);
        assert_eq!(store.reader_counts(), (1, 1));
        assert_eq!(host.state(), LifecycleState::Terminated);
    }

    #[test]
    fn test_rejected_artifact_failure_is_stage_init_error() {
        let store = store_with_input();
        store.fail_create("in/pos1.rejected.root");
        let mut host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(
                QualityFilterStage::new("charge", |_: &crate::core::Event| Ok(()))
                    .with_rejected_artifact(Arc::new(store.clone()), "rejected"),
            );

        let err = drive(&mut host, &RunOptions::new("in/pos1.txt")).unwrap_err();

        assert_eq!(err.kind(), "StageInitError");
        assert!(err.to_string().contains("in/pos1.rejected.root"));
        assert_eq!(store.artifact("in/pos1.reco.root").unwrap().closes, 1);
        assert_eq!(store.reader_counts(), (1, 1));
    }

    #[test]
    fn test_skip_stops_later_children() {
        let store = store_with_input();
        let log = call_log();
        let mut host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(SkipNumbersStage::new("quality", [1, 3]))
            .with_stage(RecordingStage::new("after", log.clone()));

        drive(&mut host, &RunOptions::new("in/pos1.txt")).unwrap();

        let execs: Vec<String> = log
            .lock()
            .iter()
            .filter(|entry| entry.starts_with("after.exec"))
            .cloned()
            .collect();
        assert_eq!(execs, vec!["after.exec:0", "after.exec:2"]);
    }

    #[test]
    fn test_terminate_continues_past_errors() {
        let store = store_with_input();
        store.fail_close("in/pos1.reco.root");
        let log = call_log();
        let mut host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(FailingStage::new("a", FailPhase::Terminate).with_log(log.clone()))
            .with_stage(RecordingStage::new("b", log.clone()));

        let err = drive(&mut host, &RunOptions::new("in/pos1.txt")).unwrap_err();

        let EventflowError::Teardown(teardown) = err else {
            panic!("expected teardown error, got {err}");
        };
        let components: Vec<&str> = teardown
            .failures
            .iter()
            .map(|f| f.component.as_str())
            .collect();
        assert_eq!(components, vec!["a", "reco.output"]);
        assert!(log.lock().contains(&"b.terminate".to_string()));
        assert_eq!(store.reader_counts(), (1, 1));
    }

    #[test]
    fn test_nested_host_writes_own_artifact() {
        let store = store_with_input();
        let inner = StageHost::nested("calib", Arc::new(store.clone()), "calib")
            .with_stage(WriteEventStage::new("calib-writer"));
        let mut host = StageHost::new("reco", Arc::new(store.clone()))
            .with_kinds("", "reco")
            .with_stage(WriteEventStage::new("reco-writer"))
            .with_stage(inner);

        drive(&mut host, &RunOptions::new("in/pos1.txt").with_output_dir("out")).unwrap();

        assert_eq!(store.artifact("out/pos1.reco.root").unwrap().events.len(), 4);
        let nested = store.artifact("out/pos1.calib.root").unwrap();
        assert_eq!(nested.events.len(), 4);
        assert_eq!(nested.closes, 1);
        assert_eq!(store.reader_counts(), (1, 1));
    }

    #[test]
    fn test_exec_before_init_is_rejected() {
        let mut host = StageHost::new("reco", Arc::new(MemoryStore::new()));
        let identity = RunIdentity::new("pos1", 0);
        let mut stats = Statistics::new();
        let mut ctx = StageContext::new(&identity, &mut stats);

        let err = host
            .exec(Event::new(0, serde_json::Value::Null), &mut ctx)
            .unwrap_err();
        assert_eq!(err.kind(), "LifecycleError");
        assert!(host.next_event().is_err());
    }

    #[test]
    fn test_drop_releases_open_handles() {
        let store = store_with_input();
        {
            let mut host = StageHost::new("reco", Arc::new(store.clone())).with_kinds("", "reco");
            let identity = RunIdentity::new("pos1", 0);
            let mut stats = Statistics::new();
            let mut ctx = StageContext::new(&identity, &mut stats);
            host.init(&RunOptions::new("in/pos1.txt"), &mut ctx).unwrap();
        }
        assert_eq!(store.reader_counts(), (1, 1));
        assert_eq!(store.artifact("in/pos1.reco.root").unwrap().closes, 1);
    }
}
