//! Testing utilities for eventflow chains.
//!
//! This module provides:
//! - Scripted stages that record, fail, skip or cancel on demand
//! - Assertions over run reports and in-memory artifacts
//! - On-disk fixtures for end-to-end runs

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_closed_once, assert_counts, assert_run_cancelled, assert_run_completed,
    assert_run_failed,
};
pub use fixtures::{
    numbered_events, read_records, run_config_json, write_input_artifact, write_scope_files,
};
pub use mocks::{
    call_log, CallLog, CancelAtStage, CountingStage, FailPhase, FailingStage, RecordingStage,
    SkipNumbersStage,
};
