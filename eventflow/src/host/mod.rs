//! Composite stages owning a run's I/O.
//!
//! This module provides:
//! - [`StageHost`], the composition node of a stage tree
//! - The artifact naming rules every host applies

mod naming;
mod stage_host;

pub use naming::{generate_name, resolve_artifact_path, ARTIFACT_EXTENSION};
pub use stage_host::StageHost;
