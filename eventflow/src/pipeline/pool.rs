//! Bounded worker pool for runs.

use super::summary::RunReport;
use crate::context::RunIdentity;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::error;

/// Runs synchronous run jobs on blocking threads, at most `limit` at a time.
///
/// A job that panics, or whose worker cannot be scheduled, yields a failed
/// report for its run; other jobs are unaffected.
pub struct RunPool {
    semaphore: Arc<Semaphore>,
    limit: usize,
    handles: Vec<(RunIdentity, JoinHandle<RunReport>)>,
}

impl RunPool {
    /// Creates a pool running at most `limit` jobs concurrently (minimum 1).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            handles: Vec::new(),
        }
    }

    /// Maximum number of concurrent jobs.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of jobs spawned and not yet joined.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no job is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Queues a job. It starts once a worker slot is free.
    pub fn spawn<F>(&mut self, identity: RunIdentity, job: F)
    where
        F: FnOnce() -> RunReport + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let job_identity = identity.clone();
        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return RunReport::failed(job_identity, "InternalError", e.to_string());
                }
            };
            match tokio::task::spawn_blocking(job).await {
                Ok(report) => report,
                Err(join_error) => {
                    error!(label = %job_identity.label, error = %join_error, "Run worker panicked");
                    RunReport::failed(
                        job_identity,
                        "InternalError",
                        format!("run worker failed: {join_error}"),
                    )
                }
            }
        });
        self.handles.push((identity, handle));
    }

    /// Waits for every job and returns the reports in spawn order.
    pub async fn join(self) -> Vec<RunReport> {
        let (identities, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(identities)
            .map(|(result, identity)| match result {
                Ok(report) => report,
                Err(join_error) => RunReport::failed(
                    identity,
                    "InternalError",
                    format!("run task failed: {join_error}"),
                ),
            })
            .collect()
    }
}

impl std::fmt::Debug for RunPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunPool")
            .field("limit", &self.limit)
            .field("pending", &self.handles.len())
            .finish()
    }
}
