//! Event feed for terminal sync outcomes.
//!
//! The feed distributes completion and retry-exhaustion events to
//! subscribers and keeps a bounded history for polling. This is how the
//! application layer learns that a change could not be saved remotely,
//! without any error crossing back into arbitrary call sites.

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};
use taskwave_model::CommandId;

/// A terminal outcome of a queued command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The command was confirmed by the server.
    Completed {
        /// The confirmed command.
        id: CommandId,
    },

    /// The command exhausted its retry budget and was marked failed.
    ///
    /// Intended for a non-blocking user notification. The optimistic
    /// local write is not rolled back.
    RetryExhausted {
        /// The failed command.
        id: CommandId,
        /// Attempts made before giving up.
        attempts: u32,
        /// The final transport error.
        error: String,
    },
}

/// Distributes sync events to subscribers, preserving emit order.
pub struct SyncEventFeed {
    subscribers: RwLock<Vec<Sender<SyncEvent>>>,
    history: RwLock<Vec<SyncEvent>>,
    max_history: usize,
}

impl SyncEventFeed {
    /// Creates a feed with the default history limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(1000)
    }

    /// Creates a feed with a specific history limit.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
        }
    }

    /// Subscribes to future events.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all live subscribers and the history.
    pub fn emit(&self, event: SyncEvent) {
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                let excess = history.len() - self.max_history;
                history.drain(..excess);
            }
        }

        // Drop subscribers whose receiver is gone.
        self.subscribers
            .write()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns recent events, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<SyncEvent> {
        self.history.read().clone()
    }
}

impl Default for SyncEventFeed {
    fn default() -> Self {
        Self::new()
    }
}
