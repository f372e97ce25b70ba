//! Lifecycle bookkeeping shared by stage implementations.

use crate::core::LifecycleState;
use crate::errors::{EventflowError, Result};

/// Tracks `Created -> Initialized -> Terminated` for one stage.
///
/// Every transition that does not follow that order fails with
/// [`EventflowError::Lifecycle`].
#[derive(Debug, Clone)]
pub struct LifecycleGuard {
    stage: String,
    state: LifecycleState,
}

impl LifecycleGuard {
    /// Creates a guard in the `Created` state.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            state: LifecycleState::Created,
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Checks that `init` may run.
    ///
    /// # Errors
    ///
    /// Fails unless the stage is still `Created`.
    pub fn check_init(&self) -> Result<()> {
        match self.state {
            LifecycleState::Created => Ok(()),
            other => Err(self.violation(format!("init called while {other}"))),
        }
    }

    /// Records a successful `init`.
    pub fn initialized(&mut self) {
        self.state = LifecycleState::Initialized;
    }

    /// Checks that `exec` may run.
    ///
    /// # Errors
    ///
    /// Fails unless the stage is `Initialized`.
    pub fn check_exec(&self) -> Result<()> {
        if self.state.can_exec() {
            Ok(())
        } else {
            Err(self.violation(format!("exec called while {}", self.state)))
        }
    }

    /// Moves to `Terminated`.
    ///
    /// # Errors
    ///
    /// Fails unless the stage is `Initialized`.
    pub fn terminate(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Initialized => {
                self.state = LifecycleState::Terminated;
                Ok(())
            }
            other => Err(self.violation(format!("terminate called while {other}"))),
        }
    }

    /// Moves to `Terminated` regardless of the current state.
    pub fn force_terminated(&mut self) {
        self.state = LifecycleState::Terminated;
    }

    fn violation(&self, message: String) -> EventflowError {
        EventflowError::lifecycle(self.stage.clone(), message)
    }
}
