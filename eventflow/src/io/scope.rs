//! Oscilloscope directory input.
//!
//! A scope directory holds one text file per channel per trigger, named
//! `<prefix>_<number>.txt` (for example `C1_00042.txt`). Files sharing the
//! same number belong to the same event. Each file holds whitespace- or
//! comma-separated `time amplitude` pairs; lines that do not parse as two
//! numbers (headers) are ignored.

use super::EventReader;
use crate::core::Event;
use crate::errors::{ResourceOpenError, Result};
use crate::options::ScopeSource;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

static SCOPE_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]+)_(\d+)\.txt$").expect("scope file pattern is valid")
});

/// Text before the first `_` of a file name, or empty if there is none.
#[must_use]
pub fn file_prefix(name: &str) -> &str {
    name.find('_').map_or("", |pos| &name[..pos])
}

/// Returns true if `name` looks like `<prefix>_<number>.txt`.
#[must_use]
pub fn is_scope_file_name(name: &str) -> bool {
    SCOPE_FILE_PATTERN.is_match(name)
}

/// The trigger number encoded in a scope file name.
#[must_use]
pub fn file_number(name: &str) -> Option<u64> {
    SCOPE_FILE_PATTERN
        .captures(name)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Lists the scope files in `dir` whose prefix is a configured channel.
///
/// Returns full path to channel id. Unreadable directories yield an empty map.
#[must_use]
pub fn scope_file_names(dir: &Path, channels: &BTreeMap<String, i64>) -> BTreeMap<PathBuf, i64> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return BTreeMap::new();
    };
    entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if !is_scope_file_name(&name) {
                return None;
            }
            let id = channels.get(file_prefix(&name))?;
            Some((entry.path(), *id))
        })
        .collect()
}

/// Parses the `time amplitude` samples of one scope file.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read.
pub fn parse_samples(path: &Path) -> Result<Vec<[f64; 2]>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter_map(|line| {
            let mut fields = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|f| !f.is_empty());
            let time = fields.next()?.parse().ok()?;
            let amplitude = fields.next()?.parse().ok()?;
            Some([time, amplitude])
        })
        .collect())
}

#[derive(Debug)]
struct ChannelFile {
    path: PathBuf,
    prefix: String,
    channel: i64,
}

/// Reads one event per trigger number from a scope directory.
#[derive(Debug)]
pub struct ScopeDirectoryReader {
    directory: PathBuf,
    groups: std::vec::IntoIter<(u64, Vec<ChannelFile>)>,
    position: u64,
    open: bool,
}

impl ScopeDirectoryReader {
    /// Opens the directory described by `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceOpenError`] if the directory does not exist or holds
    /// no file for any configured channel.
    pub fn open(source: &ScopeSource) -> Result<Self, ResourceOpenError> {
        let directory = &source.directory;
        if !directory.is_dir() {
            return Err(ResourceOpenError::input(directory, "not a directory"));
        }

        let files = scope_file_names(directory, &source.channels);
        if files.is_empty() {
            return Err(ResourceOpenError::input(
                directory,
                "no scope files for the configured channels",
            ));
        }

        let mut groups: BTreeMap<u64, Vec<ChannelFile>> = BTreeMap::new();
        for (path, channel) in files {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let Some(number) = file_number(&name) else {
                warn!(file = %name, "Skipping scope file without trigger number");
                continue;
            };
            groups.entry(number).or_default().push(ChannelFile {
                prefix: file_prefix(&name).to_string(),
                path,
                channel,
            });
        }

        debug!(
            directory = %directory.display(),
            events = groups.len(),
            "Opened scope directory"
        );

        Ok(Self {
            directory: directory.clone(),
            groups: groups.into_iter().collect::<Vec<_>>().into_iter(),
            position: 0,
            open: true,
        })
    }
}

impl EventReader for ScopeDirectoryReader {
    fn next_event(&mut self) -> Result<Option<Event>> {
        if !self.open {
            return Ok(None);
        }
        let Some((trigger, mut files)) = self.groups.next() else {
            return Ok(None);
        };
        files.sort_by_key(|f| f.channel);

        let mut signals = Vec::with_capacity(files.len());
        for file in &files {
            let samples = parse_samples(&file.path)?;
            signals.push(serde_json::json!({
                "channel": file.channel,
                "prefix": file.prefix,
                "file": file.path.display().to_string(),
                "samples": samples,
            }));
        }

        let number = self.position;
        self.position += 1;
        Ok(Some(Event::new(
            number,
            serde_json::json!({ "trigger": trigger, "signals": signals }),
        )))
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            debug!(directory = %self.directory.display(), "Closed scope directory");
        }
        Ok(())
    }
}
