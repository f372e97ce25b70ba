//! Event persistence.
//!
//! This module provides:
//! - The reader, writer and store interfaces the host drives
//! - A JSON-lines store for artifacts on disk
//! - An in-memory store for tests and benchmarks
//! - The oscilloscope directory reader

mod json_lines;
mod memory;
pub mod scope;
mod traits;

pub use json_lines::{JsonLinesReader, JsonLinesStore, JsonLinesWriter};
pub use memory::{MemoryArtifact, MemoryStore};
pub use scope::ScopeDirectoryReader;
pub use traits::{ArtifactStore, EventReader, EventWriter};
