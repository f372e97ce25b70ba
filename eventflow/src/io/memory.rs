//! In-memory artifact store.
//!
//! Used by tests and benchmarks to drive full runs without touching the
//! filesystem. Every writer shares its artifact with the store, so contents
//! and close state can be inspected after a run.

use super::{ArtifactStore, EventReader, EventWriter};
use crate::core::Event;
use crate::errors::{EventflowError, ResourceOpenError, Result};
use crate::statistics::Statistics;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Contents of one in-memory artifact.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifact {
    /// Events in write order.
    pub events: Vec<Event>,
    /// Statistics written at terminate, if any.
    pub statistics: Option<Statistics>,
    /// Number of times the writer was closed.
    pub closes: usize,
}

#[derive(Debug, Default)]
struct Inner {
    artifacts: HashMap<PathBuf, MemoryArtifact>,
    fail_create: HashSet<PathBuf>,
    fail_close: HashSet<PathBuf>,
    reads_opened: usize,
    reads_closed: usize,
}

/// Artifact store keeping every artifact in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an input artifact.
    pub fn insert(&self, path: impl Into<PathBuf>, events: Vec<Event>) {
        self.inner.lock().artifacts.insert(
            path.into(),
            MemoryArtifact {
                events,
                ..MemoryArtifact::default()
            },
        );
    }

    /// Seeds an input artifact with `count` numbered events.
    pub fn insert_numbered(&self, path: impl Into<PathBuf>, count: u64) {
        let events = (0..count)
            .map(|n| Event::new(n, serde_json::json!({ "n": n })))
            .collect();
        self.insert(path, events);
    }

    /// Makes `create_writer` fail for `path`.
    pub fn fail_create(&self, path: impl Into<PathBuf>) {
        self.inner.lock().fail_create.insert(path.into());
    }

    /// Makes the writer for `path` fail when closed.
    pub fn fail_close(&self, path: impl Into<PathBuf>) {
        self.inner.lock().fail_close.insert(path.into());
    }

    /// Returns a snapshot of the artifact at `path`.
    #[must_use]
    pub fn artifact(&self, path: impl AsRef<Path>) -> Option<MemoryArtifact> {
        self.inner.lock().artifacts.get(path.as_ref()).cloned()
    }

    /// Returns true if an artifact exists at `path`.
    #[must_use]
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().artifacts.contains_key(path.as_ref())
    }

    /// Sorted paths of every artifact in the store.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.inner.lock().artifacts.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of readers opened and closed so far.
    #[must_use]
    pub fn reader_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.reads_opened, inner.reads_closed)
    }
}

impl ArtifactStore for MemoryStore {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn EventReader>, ResourceOpenError> {
        let mut inner = self.inner.lock();
        let events = inner
            .artifacts
            .get(path)
            .map(|a| a.events.clone())
            .ok_or_else(|| ResourceOpenError::input(path, "no such artifact"))?;
        inner.reads_opened += 1;
        Ok(Box::new(MemoryReader {
            store: Arc::clone(&self.inner),
            events: events.into_iter(),
            open: true,
        }))
    }

    fn create_writer(&self, path: &Path) -> Result<Box<dyn EventWriter>, ResourceOpenError> {
        let mut inner = self.inner.lock();
        if inner.fail_create.contains(path) {
            return Err(ResourceOpenError::output(path, "creation refused"));
        }
        inner
            .artifacts
            .insert(path.to_path_buf(), MemoryArtifact::default());
        Ok(Box::new(MemoryWriter {
            store: Arc::clone(&self.inner),
            path: path.to_path_buf(),
            open: true,
        }))
    }
}

struct MemoryReader {
    store: Arc<Mutex<Inner>>,
    events: std::vec::IntoIter<Event>,
    open: bool,
}

impl EventReader for MemoryReader {
    fn next_event(&mut self) -> Result<Option<Event>> {
        if !self.open {
            return Ok(None);
        }
        Ok(self.events.next())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.store.lock().reads_closed += 1;
        }
        Ok(())
    }
}

struct MemoryWriter {
    store: Arc<Mutex<Inner>>,
    path: PathBuf,
    open: bool,
}

impl MemoryWriter {
    fn with_artifact(&self, f: impl FnOnce(&mut MemoryArtifact)) -> Result<()> {
        if !self.open {
            return Err(EventflowError::Internal(format!(
                "write to closed artifact '{}'",
                self.path.display()
            )));
        }
        let mut inner = self.store.lock();
        let artifact = inner.artifacts.entry(self.path.clone()).or_default();
        f(artifact);
        Ok(())
    }
}

impl EventWriter for MemoryWriter {
    fn write(&mut self, event: &Event) -> Result<()> {
        self.with_artifact(|a| a.events.push(event.clone()))
    }

    fn write_statistics(&mut self, stats: &Statistics) -> Result<()> {
        self.with_artifact(|a| a.statistics = Some(stats.clone()))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let mut inner = self.store.lock();
        inner.artifacts.entry(self.path.clone()).or_default().closes += 1;
        if inner.fail_close.contains(&self.path) {
            return Err(EventflowError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "flush failed",
            )));
        }
        Ok(())
    }
}
