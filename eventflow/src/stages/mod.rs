//! Stage trait and implementations.
//!
//! Stages are the units of per-event work in a run. Leaf stages transform or
//! inspect events; a [`StageHost`](crate::host::StageHost) is itself a stage
//! that owns children and I/O.

mod basic;
mod lifecycle;
mod quality;

pub use basic::{FnStage, NoOpStage, WriteEventStage};
pub use lifecycle::LifecycleGuard;
pub use quality::{QualityCheck, QualityFilterStage};

use crate::context::StageContext;
use crate::core::{Event, EventOutcome};
use crate::errors::Result;
use crate::options::RunOptions;
use std::fmt::Debug;

/// Trait for pipeline stages.
///
/// A stage goes through `init`, any number of `exec` calls, then
/// `terminate`. The enclosing host guarantees that order and calls each
/// method exactly as often as the lifecycle allows.
pub trait Stage: Send + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// One-time setup with the resolved run options.
    ///
    /// # Errors
    ///
    /// A failure here is fatal to the run.
    fn init(&mut self, options: &RunOptions, ctx: &mut StageContext<'_>) -> Result<()>;

    /// Processes one event.
    ///
    /// Returns [`EventOutcome::Skip`] for a recoverable data-quality problem;
    /// returning an error aborts the run.
    ///
    /// # Errors
    ///
    /// Returns an error when the stage declares the event non-recoverable.
    fn exec(&mut self, event: Event, ctx: &mut StageContext<'_>) -> Result<EventOutcome>;

    /// Releases stage resources and records a summary.
    ///
    /// # Errors
    ///
    /// Errors are collected by the host, never short-circuit sibling teardown.
    fn terminate(&mut self, ctx: &mut StageContext<'_>) -> Result<()>;
}
