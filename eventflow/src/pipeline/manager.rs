//! The batch entry point.

use super::chain::StageChain;
use super::executor::RunExecutor;
use super::pool::RunPool;
use super::summary::BatchSummary;
use crate::cancellation::CancellationToken;
use crate::context::RunIdentity;
use crate::core::RunStatus;
use crate::errors::{ConfigurationError, Result};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::options::{load_run_config, parse_run_config, RunOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Process-level knobs of a [`PipelineManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Upper bound on concurrently executing runs.
    pub max_parallel_runs: usize,
    /// When false, runs execute one after another.
    pub parallel: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_parallel_runs: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            parallel: true,
        }
    }
}

impl ManagerConfig {
    /// A configuration running one run at a time.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            max_parallel_runs: 1,
            parallel: false,
        }
    }

    /// Number of runs allowed to execute at once.
    #[must_use]
    pub fn effective_parallelism(&self) -> usize {
        if self.parallel {
            self.max_parallel_runs.max(1)
        } else {
            1
        }
    }
}

#[derive(Debug, Clone)]
struct PlannedRun {
    options: RunOptions,
    token: CancellationToken,
}

/// Registration point for the stage chain and the configured runs.
///
/// Constructed once by the program entry point and passed by reference to
/// whatever needs it; tests build a fresh manager per case.
pub struct PipelineManager {
    config: ManagerConfig,
    chain: Option<StageChain>,
    runs: Vec<PlannedRun>,
    sink: Arc<dyn EventSink>,
    batch_token: CancellationToken,
}

impl PipelineManager {
    /// Creates a manager with no chain and no runs.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            chain: None,
            runs: Vec::new(),
            sink: Arc::new(NoOpEventSink),
            batch_token: CancellationToken::new(),
        }
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The manager configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Registers the stage chain. A later registration replaces an earlier one.
    pub fn register_chain(&mut self, chain: StageChain) {
        if let Some(previous) = &self.chain {
            debug!(
                previous = previous.name(),
                replacement = chain.name(),
                "Replacing registered stage chain"
            );
        }
        self.chain = Some(chain);
    }

    /// The registered chain, if any.
    #[must_use]
    pub fn chain(&self) -> Option<&StageChain> {
        self.chain.as_ref()
    }

    /// Plans runs from a JSON run configuration and returns their labels.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] and plans nothing if any descriptor is
    /// invalid.
    pub fn configure(&mut self, raw: &str) -> Result<Vec<String>, ConfigurationError> {
        let runs = parse_run_config(raw)?;
        Ok(self.set_runs(runs))
    }

    /// Plans runs from a JSON run configuration file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the file cannot be read or is invalid.
    pub fn configure_file(&mut self, path: &Path) -> Result<Vec<String>, ConfigurationError> {
        let runs = load_run_config(path)?;
        Ok(self.set_runs(runs))
    }

    /// Replaces the planned runs and returns their labels.
    ///
    /// The new runs hang off a fresh batch token: a [`cancel_all`](Self::cancel_all)
    /// issued before this call does not reach them.
    pub fn set_runs(&mut self, runs: Vec<RunOptions>) -> Vec<String> {
        self.batch_token = CancellationToken::new();
        self.runs = runs
            .into_iter()
            .map(|options| PlannedRun {
                options,
                token: self.batch_token.child(),
            })
            .collect();
        info!(runs = self.runs.len(), "Configured runs");
        self.labels()
    }

    /// Labels of the planned runs, in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.runs
            .iter()
            .map(|run| run.options.label().to_string())
            .collect()
    }

    /// The options of every planned run.
    #[must_use]
    pub fn planned_runs(&self) -> Vec<&RunOptions> {
        self.runs.iter().map(|run| &run.options).collect()
    }

    /// The cancellation token of the run with `label`.
    #[must_use]
    pub fn cancellation_token(&self, label: &str) -> Option<CancellationToken> {
        self.find(label).map(|run| run.token.clone())
    }

    /// Asks the run with `label` to stop between events.
    ///
    /// Returns false if no such run is planned.
    pub fn cancel_run(&self, label: &str, reason: &str) -> bool {
        match self.find(label) {
            Some(run) => {
                info!(label, reason, "Cancelling run");
                run.token.cancel(reason);
                true
            }
            None => {
                warn!(label, "Cannot cancel unknown run");
                false
            }
        }
    }

    /// Asks every planned run to stop between events.
    pub fn cancel_all(&self, reason: &str) {
        self.batch_token.cancel(reason);
    }

    fn find(&self, label: &str) -> Option<&PlannedRun> {
        self.runs.iter().find(|run| run.options.label() == label)
    }

    /// Executes every planned run and summarizes the batch.
    ///
    /// One run's failure never stops the others. An empty plan is a
    /// successful no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] before any run starts if runs are
    /// planned but no usable chain is registered.
    pub async fn run(&self) -> Result<BatchSummary> {
        if self.runs.is_empty() {
            info!("No runs configured");
            return Ok(BatchSummary::default());
        }
        let chain = match &self.chain {
            Some(chain) if !chain.is_empty() => chain.clone(),
            Some(_) => return Err(ConfigurationError::new("registered stage chain has no passes").into()),
            None => return Err(ConfigurationError::new("no stage chain registered").into()),
        };

        let mut pool = RunPool::new(self.config.effective_parallelism());
        self.sink
            .emit(
                event_types::BATCH_STARTED,
                Some(serde_json::json!({
                    "chain": chain.name(),
                    "runs": self.runs.len(),
                    "parallelism": pool.limit(),
                })),
            )
            .await;
        info!(chain = chain.name(), runs = self.runs.len(), parallelism = pool.limit(), "Batch started");

        for (index, planned) in self.runs.iter().enumerate() {
            let identity = RunIdentity::new(planned.options.label(), index);
            let job_identity = identity.clone();
            let options = planned.options.clone();
            let token = planned.token.clone();
            let chain = chain.clone();
            let sink = Arc::clone(&self.sink);

            pool.spawn(identity, move || {
                sink.try_emit(event_types::RUN_STARTED, Some(job_identity.to_value()));
                RunExecutor::new(job_identity, options, chain.instantiate())
                    .with_cancellation(token)
                    .execute()
            });
        }

        let reports = pool.join().await;
        for report in &reports {
            let event_type = match report.status {
                RunStatus::Completed => event_types::RUN_COMPLETED,
                RunStatus::Failed => event_types::RUN_FAILED,
                RunStatus::Cancelled => event_types::RUN_CANCELLED,
            };
            self.sink
                .emit(event_type, Some(report.attributes().to_value()))
                .await;
        }

        let summary = BatchSummary::from_runs(reports);
        self.sink
            .emit(
                event_types::BATCH_COMPLETED,
                Some(serde_json::json!({
                    "runs": summary.runs_total(),
                    "failed": summary.runs_failed(),
                    "cancelled": summary.runs_cancelled(),
                    "success": summary.success(),
                })),
            )
            .await;
        info!(
            runs = summary.runs_total(),
            failed = summary.runs_failed(),
            cancelled = summary.runs_cancelled(),
            "Batch completed"
        );
        Ok(summary)
    }
}

impl Default for PipelineManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl std::fmt::Debug for PipelineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineManager")
            .field("config", &self.config)
            .field("chain", &self.chain)
            .field("runs", &self.labels())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::host::StageHost;
    use crate::io::MemoryStore;
    use crate::stages::WriteEventStage;
    use pretty_assertions::assert_eq;

    fn chain(store: &MemoryStore, name: &str) -> StageChain {
        let store = store.clone();
        StageChain::new(name).with_pass(move || {
            StageHost::new("reco", Arc::new(store.clone()))
                .with_kinds("", "reco")
                .with_stage(WriteEventStage::default())
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = ManagerConfig::default();
        assert!(config.parallel);
        assert!(config.max_parallel_runs >= 1);
        assert_eq!(ManagerConfig::sequential().effective_parallelism(), 1);

        let parsed: ManagerConfig = serde_json::from_str(r#"{"parallel": false}"#).unwrap();
        assert_eq!(parsed.effective_parallelism(), 1);
    }

    #[test]
    fn test_last_registration_wins() {
        let store = MemoryStore::new();
        let mut manager = PipelineManager::default();
        manager.register_chain(chain(&store, "first"));
        manager.register_chain(chain(&store, "second"));
        assert_eq!(manager.chain().unwrap().name(), "second");
    }

    #[test]
    fn test_configure_returns_labels() {
        let mut manager = PipelineManager::default();
        let labels = manager
            .configure(r#"[{"input": "in/a.txt", "label": "a"}, {"input": "in/b.txt"}]"#)
            .unwrap();
        assert_eq!(labels, vec!["a".to_string(), "run-1".to_string()]);
        assert!(manager.cancellation_token("a").is_some());
        assert!(manager.cancel_run("run-1", "not needed"));
        assert!(!manager.cancel_run("missing", "x"));
        assert!(manager.cancellation_token("run-1").unwrap().is_cancelled());
        assert!(!manager.cancellation_token("a").unwrap().is_cancelled());
    }

    #[test]
    fn test_replanning_releases_old_run_tokens() {
        let mut manager = PipelineManager::default();
        manager.configure(r#"[{"input": "in/a.txt", "label": "a"}]"#).unwrap();
        let stale = manager.cancellation_token("a").unwrap();
        for _ in 0..5 {
            manager
                .configure(r#"[{"input": "in/a.txt", "label": "a"}, {"input": "in/b.txt"}]"#)
                .unwrap();
        }
        assert_eq!(manager.batch_token.pending_callbacks(), 2);

        manager.cancel_all("shutdown");
        assert!(manager.cancellation_token("a").unwrap().is_cancelled());
        assert!(manager.cancellation_token("run-1").unwrap().is_cancelled());
        assert!(!stale.is_cancelled());
    }

    #[test]
    fn test_bad_configuration_plans_nothing() {
        let mut manager = PipelineManager::default();
        manager.configure(r#"[{"input": "in/a.txt"}]"#).unwrap();
        let err = manager
            .configure(r#"[{"input": "in/b.txt"}, {"input": ""}]"#)
            .unwrap_err();
        assert_eq!(err.descriptor, Some(1));
        assert_eq!(manager.labels(), vec!["run-0".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_plan_is_success() {
        let manager = PipelineManager::default();
        let summary = manager.run().await.unwrap();
        assert!(summary.success());
        assert_eq!(summary.runs_total(), 0);
    }

    #[tokio::test]
    async fn test_missing_chain_is_configuration_error() {
        let mut manager = PipelineManager::default();
        manager.configure(r#"[{"input": "in/a.txt"}]"#).unwrap();
        let err = manager.run().await.unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");

        manager.register_chain(StageChain::new("empty"));
        assert!(manager.run().await.is_err());
    }

    #[tokio::test]
    async fn test_emits_lifecycle_events() {
        let store = MemoryStore::new();
        store.insert_numbered("in/a.root", 2);
        let sink = Arc::new(CollectingEventSink::new());
        let mut manager =
            PipelineManager::new(ManagerConfig::sequential()).with_event_sink(sink.clone());
        manager.register_chain(chain(&store, "reco"));
        manager
            .configure(r#"[{"input": "in/a.txt", "label": "a"}, {"input": "in/b.txt", "label": "b"}]"#)
            .unwrap();

        let summary = manager.run().await.unwrap();

        assert_eq!(summary.runs_failed(), 1);
        assert_eq!(
            sink.types(),
            vec![
                "batch.started",
                "run.started",
                "run.started",
                "run.completed",
                "run.failed",
                "batch.completed"
            ]
        );
        assert_eq!(sink.payloads("run.failed")[0]["label"], "b");
    }
}
