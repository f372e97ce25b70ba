//! # Eventflow
//!
//! A batch executor for sequential event-processing stage chains.
//!
//! A program registers one [`StageChain`](pipeline::StageChain) of processing
//! stages and a list of runs, each describing an input source and how its
//! artifacts are named. Eventflow then:
//!
//! - **Drives every run independently**: each run gets its own stage tree,
//!   its own statistics and its own input/output artifacts
//! - **Streams events through the chain**: every stage sees an event before
//!   the next event is read; a stage may skip an event or abort the run
//! - **Derives artifact names**: `<base>.<kind>.root` next to the source or
//!   under an output directory
//! - **Releases deterministically**: resources are closed on every exit path
//!   and teardown failures are collected, not swallowed
//! - **Runs in parallel**: independent runs execute on a bounded blocking pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use eventflow::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(JsonLinesStore::new());
//! let chain = StageChain::new("reco").with_pass(move || {
//!     StageHost::new("reco", store.clone())
//!         .with_kinds("", "reco")
//!         .with_stage(WriteEventStage::default())
//! });
//!
//! let mut manager = PipelineManager::default();
//! manager.register_chain(chain);
//! manager.configure_file(Path::new("runs.json"))?;
//! let summary = manager.run().await?;
//! std::process::exit(summary.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod cancellation;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod host;
pub mod io;
pub mod observability;
pub mod options;
pub mod pipeline;
pub mod stages;
pub mod statistics;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{RunIdentity, StageContext};
    pub use crate::core::{Event, EventOutcome, EventSkipped, LifecycleState, RunStatus};
    pub use crate::errors::{
        ConfigurationError, EventflowError, ResourceOpenError, Result, StageExecError,
        StageInitError, TeardownError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::host::{generate_name, resolve_artifact_path, StageHost};
    pub use crate::io::{ArtifactStore, EventReader, EventWriter, JsonLinesStore, MemoryStore};
    pub use crate::observability::{init_json_logging, init_logging};
    pub use crate::options::{RunDescriptor, RunOptions};
    pub use crate::pipeline::{
        BatchSummary, ManagerConfig, PipelineManager, RunReport, StageChain,
    };
    pub use crate::stages::{FnStage, NoOpStage, QualityFilterStage, Stage, WriteEventStage};
    pub use crate::statistics::{Statistics, StatisticsReport};
}
