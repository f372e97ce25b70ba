//! JSON-lines artifact store.
//!
//! Each line of an artifact is one record: either an event or the statistics
//! block written at terminate. Lines that are not records are read as raw
//! event payloads, numbered by position, so plain JSON-lines input files can
//! feed the first pass of a chain.

use super::{ArtifactStore, EventReader, EventWriter};
use crate::core::Event;
use crate::errors::{ResourceOpenError, Result};
use crate::statistics::Statistics;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record {
    Event(Event),
    Statistics { statistics: Statistics },
}

/// Artifact store backed by JSON-lines files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesStore;

impl JsonLinesStore {
    /// Creates a new store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactStore for JsonLinesStore {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn EventReader>, ResourceOpenError> {
        Ok(Box::new(JsonLinesReader::open(path)?))
    }

    fn create_writer(&self, path: &Path) -> Result<Box<dyn EventWriter>, ResourceOpenError> {
        Ok(Box::new(JsonLinesWriter::create(path)?))
    }
}

/// Reads events from a JSON-lines artifact.
#[derive(Debug)]
pub struct JsonLinesReader {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    position: u64,
}

impl JsonLinesReader {
    /// Opens the artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceOpenError`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ResourceOpenError> {
        let file = File::open(path).map_err(|e| ResourceOpenError::input(path, e.to_string()))?;
        debug!(path = %path.display(), "Opened input artifact");
        Ok(Self {
            path: path.to_path_buf(),
            lines: Some(BufReader::new(file).lines()),
            position: 0,
        })
    }
}

impl EventReader for JsonLinesReader {
    fn next_event(&mut self) -> Result<Option<Event>> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        for line in lines.by_ref() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let number = self.position;
            self.position += 1;
            match serde_json::from_str::<Record>(&line) {
                Ok(Record::Event(event)) => return Ok(Some(event)),
                Ok(Record::Statistics { .. }) => {
                    self.position -= 1;
                }
                Err(_) => {
                    let payload: serde_json::Value = serde_json::from_str(&line)?;
                    return Ok(Some(Event::new(number, payload)));
                }
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        if self.lines.take().is_some() {
            debug!(path = %self.path.display(), "Closed input artifact");
        }
        Ok(())
    }
}

/// Writes events to a JSON-lines artifact.
#[derive(Debug)]
pub struct JsonLinesWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
}

impl JsonLinesWriter {
    /// Creates (or truncates) the artifact at `path`, creating missing
    /// parent directories.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceOpenError`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, ResourceOpenError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| ResourceOpenError::output(path, e.to_string()))?;
        }
        let file =
            File::create(path).map_err(|e| ResourceOpenError::output(path, e.to_string()))?;
        debug!(path = %path.display(), "Created output artifact");
        Ok(Self {
            path: path.to_path_buf(),
            out: Some(BufWriter::new(file)),
        })
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Err(crate::errors::EventflowError::Internal(format!(
                "write to closed artifact '{}'",
                self.path.display()
            )));
        };
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

impl EventWriter for JsonLinesWriter {
    fn write(&mut self, event: &Event) -> Result<()> {
        self.write_record(&Record::Event(event.clone()))
    }

    fn write_statistics(&mut self, stats: &Statistics) -> Result<()> {
        self.write_record(&Record::Statistics {
            statistics: stats.clone(),
        })
    }

    fn is_open(&self) -> bool {
        self.out.is_some()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
            debug!(path = %self.path.display(), "Closed output artifact");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_skips_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.reco.root");

        let mut writer = JsonLinesWriter::create(&path).unwrap();
        writer.write(&Event::new(0, serde_json::json!({"a": 1}))).unwrap();
        writer.write(&Event::new(1, serde_json::json!({"a": 2}))).unwrap();
        let mut stats = Statistics::new();
        stats.increment("x");
        writer.write_statistics(&stats).unwrap();
        writer.close().unwrap();
        assert!(!writer.is_open());

        let mut reader = JsonLinesReader::open(&path).unwrap();
        let first = reader.next_event().unwrap().unwrap();
        let second = reader.next_event().unwrap().unwrap();
        assert_eq!(first.payload, serde_json::json!({"a": 1}));
        assert_eq!(second.number, 1);
        assert!(reader.next_event().unwrap().is_none());
        reader.close().unwrap();
        reader.close().unwrap();
    }

    #[test]
    fn test_raw_lines_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.root");
        std::fs::write(&path, "{\"v\": 10}\n\n[1,2]\n").unwrap();

        let mut reader = JsonLinesReader::open(&path).unwrap();
        let a = reader.next_event().unwrap().unwrap();
        let b = reader.next_event().unwrap().unwrap();
        assert_eq!((a.number, b.number), (0, 1));
        assert_eq!(b.payload, serde_json::json!([1, 2]));
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn test_open_missing_input_fails() {
        let err = JsonLinesReader::open(Path::new("/no/such/input.root")).unwrap_err();
        assert_eq!(err.role, crate::errors::ResourceRole::Input);
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonLinesWriter::create(&dir.path().join("x.root")).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.write(&Event::new(0, serde_json::Value::Null)).is_err());
    }
}
