//! Chain registration and batch execution.
//!
//! This module provides:
//! - Stage chains built from per-run host factories
//! - The per-run event loop
//! - A bounded pool running independent runs concurrently
//! - Run and batch reports

mod chain;
mod executor;
mod manager;
mod pool;
mod summary;


pub use chain::{HostFactory, StageChain};
pub use executor::RunExecutor;
pub use manager::{ManagerConfig, PipelineManager};
pub use pool::RunPool;
pub use summary::{BatchSummary, PassReport, RunReport};
