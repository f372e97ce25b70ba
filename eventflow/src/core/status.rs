//! Lifecycle and run status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a stage is in its `init → exec* → terminate` lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed, not yet initialized.
    #[default]
    Created,
    /// `init` succeeded; `exec` may be called.
    Initialized,
    /// `terminate` has been called.
    Terminated,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initialized => write!(f, "initialized"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

impl LifecycleState {
    /// Returns true if `exec` may be called in this state.
    #[must_use]
    pub fn can_exec(&self) -> bool {
        matches!(self, Self::Initialized)
    }
}

/// The final status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every pass completed without a fatal error.
    Completed,
    /// A fatal error stopped the run.
    Failed,
    /// The run was asked to stop between events.
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status counts against overall batch success.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}
