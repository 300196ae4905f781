//! Error types for storage and the operation store.

use std::io;
use taskwave_model::{CommandId, ModelError};
use thiserror::Error;

/// Result type for storage backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },
}

/// Result type for operation store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the operation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A command payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] ModelError),

    /// The operation log contains data that cannot be interpreted.
    #[error("operation log corrupted: {0}")]
    Corrupted(String),

    /// The referenced command does not exist in the store.
    #[error("unknown command {0}")]
    UnknownCommand(CommandId),

    /// A command with this id is already in the store.
    #[error("duplicate command {0}")]
    DuplicateCommand(CommandId),
}
