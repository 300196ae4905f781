//! Error types for the sync engine.

use crate::local::LocalStoreError;
use taskwave_model::CommandId;
use taskwave_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The optimistic local write failed. Nothing was queued.
    #[error("local store error: {0}")]
    Local(#[from] LocalStoreError),

    /// The remote call failed.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A command reached its retry budget and was marked failed.
    #[error("retries exhausted after {attempts} attempts for command {id}")]
    RetryExhausted {
        /// The failed command.
        id: CommandId,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The durable operation store failed.
    #[error("durable store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
