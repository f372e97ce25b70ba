//! Run statistics.
//!
//! This module provides:
//! - The per-run [`Statistics`] container shared by every stage of a run
//! - The batch-wide [`StatisticsReport`] built after all runs finish

mod container;
mod report;

pub use container::{
    StageSummary, Statistics, EVENTS_DISCARDED, EVENTS_PROCESSED, EVENTS_SKIPPED,
};
pub use report::StatisticsReport;
