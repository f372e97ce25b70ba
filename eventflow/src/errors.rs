//! Error types for the eventflow executor.
//!
//! The taxonomy follows the run lifecycle: configuration problems abort the
//! whole batch before anything starts, resource and stage errors are fatal to
//! the owning run only, and teardown errors are collected so that every child
//! and handle gets a chance to release before anything is reported.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T, E = EventflowError> = std::result::Result<T, E>;

/// The main error type for eventflow operations.
#[derive(Debug, Error)]
pub enum EventflowError {
    /// The batch configuration is malformed.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// An input could not be read or an output could not be created.
    #[error("{0}")]
    ResourceOpen(#[from] ResourceOpenError),

    /// A stage failed its one-time setup.
    #[error("{0}")]
    StageInit(#[from] StageInitError),

    /// A stage declared a per-event failure non-recoverable.
    #[error("{0}")]
    StageExec(#[from] StageExecError),

    /// One or more resources failed to close cleanly.
    #[error("{0}")]
    Teardown(#[from] TeardownError),

    /// The run was asked to stop between events.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// A stage was driven out of lifecycle order.
    #[error("Lifecycle violation in '{stage}': {message}")]
    Lifecycle {
        /// The stage that was called out of order.
        stage: String,
        /// What was attempted.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EventflowError {
    /// Creates a lifecycle violation error.
    #[must_use]
    pub fn lifecycle(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable name of the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::ResourceOpen(_) => "ResourceOpenError",
            Self::StageInit(_) => "StageInitError",
            Self::StageExec(_) => "StageExecError",
            Self::Teardown(_) => "TeardownError",
            Self::Cancelled(_) => "Cancelled",
            Self::Lifecycle { .. } => "LifecycleError",
            Self::Serialization(_) => "SerializationError",
            Self::Internal(_) => "InternalError",
            Self::Io(_) => "IoError",
        }
    }

    /// Returns true if this error only reports a cancellation request.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::Teardown(err) = self {
            map.insert(
                "failures".to_string(),
                serde_json::to_value(&err.failures).unwrap_or_default(),
            );
        }
        map
    }
}

impl From<serde_json::Error> for EventflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when the run configuration cannot be turned into runs.
#[derive(Debug, Clone, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// Index of the offending run descriptor, if any.
    pub descriptor: Option<usize>,
    /// Name of the offending field, if any.
    pub field: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            descriptor: None,
            field: None,
        }
    }

    /// Creates an error pointing at one field of one descriptor.
    #[must_use]
    pub fn at(descriptor: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("run #{descriptor}, field '{field}': {}", message.into()),
            descriptor: Some(descriptor),
            field: Some(field),
        }
    }
}

/// Direction of the resource that failed to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceRole {
    /// An input artifact or directory.
    Input,
    /// An output artifact.
    Output,
    /// An auxiliary artifact opened by a stage.
    Auxiliary,
}

impl std::fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Auxiliary => write!(f, "auxiliary"),
        }
    }
}

/// Error raised when an input cannot be read or an output cannot be created.
#[derive(Debug, Clone, Error)]
#[error("Cannot open {role} resource '{}': {reason}", .path.display())]
pub struct ResourceOpenError {
    /// The path that could not be opened.
    pub path: PathBuf,
    /// Whether the path was an input or an output.
    pub role: ResourceRole,
    /// The underlying reason.
    pub reason: String,
}

impl ResourceOpenError {
    /// Creates a new resource open error.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, role: ResourceRole, reason: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            role,
            reason: reason.into(),
        }
    }

    /// Creates an input open error.
    #[must_use]
    pub fn input(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::new(path, ResourceRole::Input, reason)
    }

    /// Creates an output open error.
    #[must_use]
    pub fn output(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::new(path, ResourceRole::Output, reason)
    }
}

/// Error raised when a stage's one-time setup fails.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' failed to initialize: {message}")]
pub struct StageInitError {
    /// The stage name.
    pub stage: String,
    /// The error message.
    pub message: String,
    /// The auxiliary resource that could not be opened, if that was the cause.
    #[source]
    pub cause: Option<ResourceOpenError>,
}

impl StageInitError {
    /// Creates a new stage init error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Creates an init error for a stage whose auxiliary artifact could not be opened.
    #[must_use]
    pub fn auxiliary(stage: impl Into<String>, mut cause: ResourceOpenError) -> Self {
        cause.role = ResourceRole::Auxiliary;
        Self {
            stage: stage.into(),
            message: cause.to_string(),
            cause: Some(cause),
        }
    }
}

/// Error raised when a stage aborts the run on an event.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' aborted on event {event}: {message}")]
pub struct StageExecError {
    /// The stage name.
    pub stage: String,
    /// Number of the event being processed.
    pub event: u64,
    /// The error message.
    pub message: String,
}

impl StageExecError {
    /// Creates a new stage exec error.
    #[must_use]
    pub fn new(stage: impl Into<String>, event: u64, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            event,
            message: message.into(),
        }
    }
}

/// A single failure recorded during teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownFailure {
    /// The stage or resource that failed to finalize.
    pub component: String,
    /// The failure message.
    pub message: String,
}

/// Error raised when one or more components fail to finalize.
#[derive(Debug, Clone, Default, Error)]
#[error("Teardown failed for {}", describe_failures(.failures))]
pub struct TeardownError {
    /// Every failure collected during teardown, in order.
    pub failures: Vec<TeardownFailure>,
}

fn describe_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.component, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl TeardownError {
    /// Creates an empty teardown error collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a teardown error with a single failure.
    #[must_use]
    pub fn single(component: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.push(component, message);
        err
    }

    /// Records a failure.
    pub fn push(&mut self, component: impl Into<String>, message: impl Into<String>) {
        self.failures.push(TeardownFailure {
            component: component.into(),
            message: message.into(),
        });
    }

    /// Folds any error into this collector.
    ///
    /// Nested teardown errors are flattened so the report stays one level deep.
    pub fn absorb(&mut self, component: &str, err: EventflowError) {
        match err {
            EventflowError::Teardown(inner) => self.failures.extend(inner.failures),
            other => self.push(component, other.to_string()),
        }
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts the collector into a result.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}
