//! Run-descriptor documents and their translation into [`RunOptions`].
//!
//! The external configuration parser resolves its input into a list of run
//! descriptors; this module validates that list as a whole and fails before
//! any run is planned if a single descriptor is malformed.

use super::{RunOptions, ScopeSource};
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Oscilloscope block of a run descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeDescriptor {
    /// Directory holding the scope files.
    pub directory: PathBuf,
    /// Channel prefix to channel id.
    pub channels: BTreeMap<String, i64>,
}

/// One run as described by the external configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunDescriptor {
    /// Source path; artifact names are derived from it.
    pub input: String,
    /// Optional run label; defaults to `run-<index>`.
    #[serde(default)]
    pub label: Option<String>,
    /// Directory receiving output artifacts.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Input artifact kind.
    #[serde(default)]
    pub input_kind: String,
    /// Output artifact kind.
    #[serde(default)]
    pub output_kind: String,
    /// First event to process; negative means unbounded.
    #[serde(default)]
    pub first_event: Option<i64>,
    /// Last event to process; negative means unbounded.
    #[serde(default)]
    pub last_event: Option<i64>,
    /// Oscilloscope directory input.
    #[serde(default)]
    pub scope: Option<ScopeDescriptor>,
}

impl RunDescriptor {
    /// Creates a descriptor for the given source path.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            label: None,
            output_dir: None,
            input_kind: String::new(),
            output_kind: String::new(),
            first_event: None,
            last_event: None,
            scope: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RunDocument {
    Wrapped { runs: Vec<RunDescriptor> },
    List(Vec<RunDescriptor>),
}

/// Parses a JSON run document into one [`RunOptions`] per descriptor.
///
/// Accepts either `{"runs": [...]}` or a bare array. An empty list is valid
/// and yields no runs.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if the document is not valid JSON of the
/// expected shape or if any descriptor fails validation.
pub fn parse_run_config(raw: &str) -> Result<Vec<RunOptions>, ConfigurationError> {
    let document: RunDocument = serde_json::from_str(raw)
        .map_err(|e| ConfigurationError::new(format!("Invalid run document: {e}")))?;
    let descriptors = match document {
        RunDocument::Wrapped { runs } | RunDocument::List(runs) => runs,
    };
    build_run_options(&descriptors)
}

/// Reads and parses a JSON run document from disk.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if the file cannot be read or parsed.
pub fn load_run_config(path: &Path) -> Result<Vec<RunOptions>, ConfigurationError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigurationError::new(format!(
            "Failed to read run document '{}': {e}",
            path.display()
        ))
    })?;
    parse_run_config(&raw)
}

/// Validates descriptors and converts them into run options.
///
/// Every descriptor is validated before any options are returned.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn build_run_options(
    descriptors: &[RunDescriptor],
) -> Result<Vec<RunOptions>, ConfigurationError> {
    let mut labels = HashSet::new();
    let mut runs = Vec::with_capacity(descriptors.len());

    for (index, descriptor) in descriptors.iter().enumerate() {
        let options = validate_descriptor(index, descriptor)?;
        if !labels.insert(options.label().to_string()) {
            return Err(ConfigurationError::at(
                index,
                "label",
                format!("duplicate run label '{}'", options.label()),
            ));
        }
        runs.push(options);
    }

    debug!(runs = runs.len(), "Run configuration validated");
    Ok(runs)
}

fn validate_descriptor(
    index: usize,
    descriptor: &RunDescriptor,
) -> Result<RunOptions, ConfigurationError> {
    if descriptor.input.trim().is_empty() {
        return Err(ConfigurationError::at(index, "input", "must not be empty"));
    }

    let first = bound(descriptor.first_event);
    let last = bound(descriptor.last_event);
    if let (Some(first), Some(last)) = (first, last) {
        if first > last {
            return Err(ConfigurationError::at(
                index,
                "first_event",
                format!("first event {first} is after last event {last}"),
            ));
        }
    }

    let label = match &descriptor.label {
        Some(label) if label.trim().is_empty() => {
            return Err(ConfigurationError::at(index, "label", "must not be blank"));
        }
        Some(label) => label.clone(),
        None => format!("run-{index}"),
    };

    let mut options = RunOptions::new(descriptor.input.clone())
        .with_label(label)
        .with_kinds(descriptor.input_kind.clone(), descriptor.output_kind.clone())
        .with_bounds(first, last);

    if let Some(dir) = &descriptor.output_dir {
        options = options.with_output_dir(dir.clone());
    }

    if let Some(scope) = &descriptor.scope {
        if scope.directory.as_os_str().is_empty() {
            return Err(ConfigurationError::at(
                index,
                "scope.directory",
                "must not be empty",
            ));
        }
        if scope.channels.is_empty() {
            return Err(ConfigurationError::at(
                index,
                "scope.channels",
                "at least one channel is required",
            ));
        }
        options = options.with_scope(ScopeSource {
            directory: scope.directory.clone(),
            channels: scope.channels.clone(),
        });
    }

    Ok(options)
}

fn bound(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_wrapped_document() {
        let raw = r#"{
            "runs": [
                {"input": "data/a.hld", "output_kind": "reco.sig", "output_dir": "out"},
                {"input": "data/b.hld", "label": "second", "first_event": 1, "last_event": 3}
            ]
        }"#;
        let runs = parse_run_config(raw).unwrap();

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].label(), "run-0");
        assert_eq!(runs[0].output_kind(), "reco.sig");
        assert_eq!(runs[0].output_dir(), Some("out"));
        assert_eq!(runs[1].label(), "second");
        assert_eq!(runs[1].first_event(), Some(1));
        assert_eq!(runs[1].last_event(), Some(3));
    }

    #[test]
    fn test_parse_bare_list() {
        let runs = parse_run_config(r#"[{"input": "x.txt"}]"#).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].input_file(), "x.txt");
    }

    #[test]
    fn test_empty_document_is_not_an_error() {
        assert!(parse_run_config(r#"{"runs": []}"#).unwrap().is_empty());
        assert!(parse_run_config("[]").unwrap().is_empty());
    }

    #[test]
    fn test_negative_bounds_mean_unbounded() {
        let runs =
            parse_run_config(r#"[{"input": "x", "first_event": -1, "last_event": -1}]"#).unwrap();
        assert_eq!(runs[0].first_event(), None);
        assert_eq!(runs[0].last_event(), None);
    }

    #[test]
    fn test_invalid_json_fails() {
        let err = parse_run_config("{not json").unwrap_err();
        assert!(err.message.contains("Invalid run document"));
    }

    #[test]
    fn test_unknown_field_fails() {
        assert!(parse_run_config(r#"[{"input": "x", "bogus": 1}]"#).is_err());
    }

    #[test]
    fn test_one_bad_descriptor_fails_whole_batch() {
        let raw = r#"[{"input": "ok.hld"}, {"input": "  "}]"#;
        let err = parse_run_config(raw).unwrap_err();
        assert_eq!(err.descriptor, Some(1));
        assert_eq!(err.field.as_deref(), Some("input"));
    }

    #[test]
    fn test_inverted_bounds_fail() {
        let err = parse_run_config(r#"[{"input": "x", "first_event": 5, "last_event": 2}]"#)
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("first_event"));
    }

    #[test]
    fn test_duplicate_labels_fail() {
        let raw = r#"[{"input": "a", "label": "same"}, {"input": "b", "label": "same"}]"#;
        let err = parse_run_config(raw).unwrap_err();
        assert_eq!(err.descriptor, Some(1));
        assert!(err.message.contains("duplicate"));
    }

    #[test]
    fn test_scope_requires_channels() {
        let raw = r#"[{"input": "x", "scope": {"directory": "scope/0", "channels": {}}}]"#;
        let err = parse_run_config(raw).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("scope.channels"));
    }

    #[test]
    fn test_scope_descriptor() {
        let raw = r#"[{
            "input": "data/test_file_test_0",
            "output_kind": "reco.sig",
            "scope": {"directory": "scope/0", "channels": {"C1": 0, "C2": 1}}
        }]"#;
        let runs = parse_run_config(raw).unwrap();
        let scope = runs[0].scope().unwrap();
        assert_eq!(scope.directory, PathBuf::from("scope/0"));
        assert_eq!(scope.channels.get("C2"), Some(&1));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = load_run_config(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.message.contains("Failed to read"));
    }
}
