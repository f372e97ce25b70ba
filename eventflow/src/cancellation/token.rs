//! Cancellation token for cooperative run cancellation.
//!
//! Runs check their token between events, never in the middle of a stage
//! chain, so a cancelled run always finishes its current event and then
//! terminates normally.

use crate::errors::{EventflowError, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
    callbacks: RwLock<Vec<CancelCallback>>,
}

impl TokenState {
    fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }
}

/// A shareable handle for cooperative cancellation.
///
/// Clones observe the same state. Cancellation is idempotent: only the first
/// reason is kept.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled whenever `self` is.
    ///
    /// Cancelling the child leaves the parent untouched.
    #[must_use]
    pub fn child(&self) -> Self {
        let child = Self::new();
        let linked = child.clone();
        let parent = Arc::downgrade(&self.state);
        self.on_cancel(move || {
            let reason = parent
                .upgrade()
                .and_then(|state| state.reason())
                .unwrap_or_default();
            linked.cancel(reason);
        });
        child
    }

    /// Requests cancellation with a reason.
    ///
    /// Callbacks are invoked immediately. Panics in callbacks are logged and
    /// suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        {
            // Readers that observe the flag block on the reason until it is set.
            let mut slot = self.state.reason.write();
            if self.state.cancelled.swap(true, Ordering::SeqCst) {
                return;
            }
            *slot = Some(reason.into());
        }

        let callbacks = std::mem::take(&mut *self.state.callbacks.write());
        for callback in &callbacks {
            invoke(callback.as_ref());
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut callbacks = self.state.callbacks.write();
        if self.is_cancelled() {
            drop(callbacks);
            invoke(&callback);
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_callbacks(&self) -> usize {
        self.state.callbacks.read().len()
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.reason()
    }

    /// Fails with [`EventflowError::Cancelled`] once cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns the cancellation error carrying the recorded reason.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EventflowError::Cancelled(self.reason().unwrap_or_default()))
        } else {
            Ok(())
        }
    }
}

fn invoke(callback: &(dyn Fn() + Send + Sync)) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
