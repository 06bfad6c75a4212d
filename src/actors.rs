//! Background task handles.
//!
//! The activity monitor and the dispatcher each run as an independent
//! periodic tokio task. They share nothing directly; all coordination goes
//! through the state store. `ActorHandle` is the owner's lever for graceful
//! shutdown.

use tokio_util::sync::CancellationToken;

/// Handle to a running periodic task, used for graceful shutdown.
pub struct ActorHandle {
    cancel: CancellationToken,
}

impl ActorHandle {
    /// Create a new actor handle with a cancellation token.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Signal the actor to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
