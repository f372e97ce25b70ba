//! Immutable per-run option bag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// The fixed set of keys a [`RunOptions`] may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionKey {
    /// Human-readable run label.
    Label,
    /// Source path the artifact names are derived from.
    InputFile,
    /// Artifact kind of the input.
    InputFileType,
    /// Resolved output artifact path (derived at host init).
    OutputFile,
    /// Artifact kind of the output.
    OutputFileType,
    /// Directory receiving output artifacts.
    OutputPath,
    /// First event number to process (inclusive).
    FirstEvent,
    /// Last event number to process (inclusive).
    LastEvent,
    /// Directory of oscilloscope ASCII files.
    ScopeDirectory,
    /// Channel prefix to channel id mapping for scope input.
    ScopeChannels,
}

impl OptionKey {
    /// Returns the external name of the key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::InputFile => "inputFile",
            Self::InputFileType => "inputFileType",
            Self::OutputFile => "outputFile",
            Self::OutputFileType => "outputFileType",
            Self::OutputPath => "outputPath",
            Self::FirstEvent => "firstEvent",
            Self::LastEvent => "lastEvent",
            Self::ScopeDirectory => "scopeDirectory",
            Self::ScopeChannels => "scopeChannels",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Oscilloscope directory input attached to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSource {
    /// Directory holding the `<prefix>_<number>.txt` files.
    pub directory: PathBuf,
    /// Channel prefix (e.g. `C1`) to channel id.
    pub channels: BTreeMap<String, i64>,
}

/// Named configuration for one run.
///
/// A `RunOptions` is built once per run descriptor and never mutated after it
/// is handed to an executor. Deriving resolved names produces a new value via
/// [`RunOptions::with`], leaving the original untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    values: BTreeMap<OptionKey, serde_json::Value>,
}

impl RunOptions {
    /// Creates options for the given source path.
    #[must_use]
    pub fn new(input_file: impl Into<String>) -> Self {
        Self::default().with(OptionKey::InputFile, serde_json::json!(input_file.into()))
    }

    /// Returns a copy with one key set.
    #[must_use]
    pub fn with(mut self, key: OptionKey, value: serde_json::Value) -> Self {
        self.values.insert(key, value);
        self
    }

    /// Sets the run label.
    #[must_use]
    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.with(OptionKey::Label, serde_json::json!(label.into()))
    }

    /// Sets the input and output artifact kinds.
    #[must_use]
    pub fn with_kinds(self, input_kind: impl Into<String>, output_kind: impl Into<String>) -> Self {
        self.with(OptionKey::InputFileType, serde_json::json!(input_kind.into()))
            .with(OptionKey::OutputFileType, serde_json::json!(output_kind.into()))
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(self, dir: impl Into<String>) -> Self {
        self.with(OptionKey::OutputPath, serde_json::json!(dir.into()))
    }

    /// Sets the run-selection bounds (inclusive).
    #[must_use]
    pub fn with_bounds(self, first: Option<u64>, last: Option<u64>) -> Self {
        let mut options = self;
        if let Some(first) = first {
            options = options.with(OptionKey::FirstEvent, serde_json::json!(first));
        }
        if let Some(last) = last {
            options = options.with(OptionKey::LastEvent, serde_json::json!(last));
        }
        options
    }

    /// Attaches an oscilloscope directory input.
    #[must_use]
    pub fn with_scope(self, scope: ScopeSource) -> Self {
        let channels = serde_json::to_value(&scope.channels).unwrap_or_default();
        self.with(
            OptionKey::ScopeDirectory,
            serde_json::json!(scope.directory.to_string_lossy()),
        )
        .with(OptionKey::ScopeChannels, channels)
    }

    /// Gets a raw value.
    #[must_use]
    pub fn get(&self, key: OptionKey) -> Option<&serde_json::Value> {
        self.values.get(&key)
    }

    /// Gets a string value; missing or non-string values read as empty.
    #[must_use]
    pub fn get_str(&self, key: OptionKey) -> &str {
        self.get(key).and_then(serde_json::Value::as_str).unwrap_or("")
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, key: OptionKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &serde_json::Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// The run label, or the input file when no label was given.
    #[must_use]
    pub fn label(&self) -> &str {
        match self.get_str(OptionKey::Label) {
            "" => self.input_file(),
            label => label,
        }
    }

    /// The source path.
    #[must_use]
    pub fn input_file(&self) -> &str {
        self.get_str(OptionKey::InputFile)
    }

    /// The input artifact kind (empty if none).
    #[must_use]
    pub fn input_kind(&self) -> &str {
        self.get_str(OptionKey::InputFileType)
    }

    /// The output artifact kind (empty if none).
    #[must_use]
    pub fn output_kind(&self) -> &str {
        self.get_str(OptionKey::OutputFileType)
    }

    /// The resolved output file, once a host has derived it.
    #[must_use]
    pub fn output_file(&self) -> Option<&str> {
        self.get(OptionKey::OutputFile).and_then(serde_json::Value::as_str)
    }

    /// The output directory, if one was configured.
    #[must_use]
    pub fn output_dir(&self) -> Option<&str> {
        match self.get_str(OptionKey::OutputPath) {
            "" => None,
            dir => Some(dir),
        }
    }

    /// First event to process; `None` means from the start.
    #[must_use]
    pub fn first_event(&self) -> Option<u64> {
        self.get(OptionKey::FirstEvent).and_then(serde_json::Value::as_u64)
    }

    /// Last event to process; `None` means until exhaustion.
    #[must_use]
    pub fn last_event(&self) -> Option<u64> {
        self.get(OptionKey::LastEvent).and_then(serde_json::Value::as_u64)
    }

    /// Returns true if `number` falls inside the selection bounds.
    #[must_use]
    pub fn selects(&self, number: u64) -> bool {
        self.first_event().map_or(true, |first| number >= first)
            && self.last_event().map_or(true, |last| number <= last)
    }

    /// Returns true once `number` is past the last selected event.
    #[must_use]
    pub fn is_past_last(&self, number: u64) -> bool {
        self.last_event().is_some_and(|last| number > last)
    }

    /// The oscilloscope input, if configured.
    #[must_use]
    pub fn scope(&self) -> Option<ScopeSource> {
        let directory = self.get(OptionKey::ScopeDirectory)?.as_str()?;
        let channels = self
            .get(OptionKey::ScopeChannels)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        Some(ScopeSource {
            directory: PathBuf::from(directory),
            channels,
        })
    }

    /// Returns true once a host has derived the resolved names.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.contains(OptionKey::OutputFile)
    }
}
