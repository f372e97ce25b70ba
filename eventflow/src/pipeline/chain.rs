//! Stage chain definitions.

use crate::host::StageHost;
use std::sync::Arc;

/// Factory producing one fresh root host.
pub type HostFactory = Arc<dyn Fn() -> StageHost + Send + Sync>;

/// Ordered list of root-host factories.
///
/// The same chain instantiates an independent stage tree for every run.
/// Each root is one pass over the run: pass *k+1* reads the artifact pass
/// *k* wrote.
#[derive(Clone, Default)]
pub struct StageChain {
    name: String,
    passes: Vec<HostFactory>,
}

impl StageChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: Vec::new(),
        }
    }

    /// Appends a pass.
    #[must_use]
    pub fn with_pass<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> StageHost + Send + Sync + 'static,
    {
        self.passes.push(Arc::new(factory));
        self
    }

    /// The chain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns true if the chain has no pass.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Builds a fresh root host for every pass.
    #[must_use]
    pub fn instantiate(&self) -> Vec<StageHost> {
        self.passes.iter().map(|factory| factory()).collect()
    }
}

impl std::fmt::Debug for StageChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageChain")
            .field("name", &self.name)
            .field("passes", &self.passes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RunIdentity, StageContext};
    use crate::core::LifecycleState;
    use crate::io::MemoryStore;
    use crate::options::RunOptions;
    use crate::stages::{NoOpStage, Stage};
    use crate::statistics::Statistics;

    #[test]
    fn test_instantiate_builds_independent_hosts() {
        let store = MemoryStore::new();
        store.insert_numbered("in/pos1.root", 2);
        let chain = {
            let store = Arc::new(store.clone());
            StageChain::new("reco").with_pass(move || {
                StageHost::new("reco", store.clone())
                    .with_kinds("", "reco")
                    .with_stage(NoOpStage::new("noop"))
            })
        };

        let mut first = chain.instantiate();
        let mut second = chain.instantiate();
        assert_eq!(chain.len(), 1);
        assert_eq!(first.len(), 1);
        assert_eq!(second[0].len(), 1);

        let identity = RunIdentity::new("pos1", 0);
        let options = RunOptions::new("in/pos1.txt");
        let mut stats = Statistics::new();
        let mut ctx = StageContext::new(&identity, &mut stats);
        first[0].init(&options, &mut ctx).unwrap();
        first[0].terminate(&mut ctx).unwrap();

        assert_eq!(first[0].state(), LifecycleState::Terminated);
        assert_eq!(second[0].state(), LifecycleState::Created);
        assert!(second[0].output_path().is_none());

        second[0].init(&options, &mut ctx).unwrap();
        second[0].terminate(&mut ctx).unwrap();
        assert_eq!(second[0].state(), LifecycleState::Terminated);
        assert_eq!(store.reader_counts(), (2, 2));
    }
}
