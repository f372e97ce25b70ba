//! Core domain model types for eventflow.
//!
//! This module contains the values that flow through a run:
//! - The event handed to each stage
//! - The per-event outcome a stage reports
//! - Lifecycle and run status enums

mod event;
mod outcome;
mod status;

pub use event::Event;
pub use outcome::{EventOutcome, EventSkipped};
pub use status::{LifecycleState, RunStatus};
