//! Sync command lifecycle types.

use crate::error::{ModelError, ModelResult};
use crate::operation::MutationOperation;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Returns the current wall-clock time in unix milliseconds.
#[must_use]
pub fn unix_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Unique identifier for a sync command.
///
/// Assigned once at command creation and immutable afterwards.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Creates a new random command id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a command id from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> [u8; 16] {
        self.0.into_bytes()
    }

    /// Creates a command id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandId({})", self.0)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a sync command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Waiting for remote execution.
    Pending,
    /// Being executed right now. Transient, never persisted.
    InProgress,
    /// Confirmed by the server.
    Completed,
    /// Retry budget exhausted, no longer retried automatically.
    Failed,
}

impl CommandStatus {
    /// Converts to a numeric code for durable encoding.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            CommandStatus::Pending => 1,
            CommandStatus::InProgress => 2,
            CommandStatus::Completed => 3,
            CommandStatus::Failed => 4,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(CommandStatus::Pending),
            2 => Some(CommandStatus::InProgress),
            3 => Some(CommandStatus::Completed),
            4 => Some(CommandStatus::Failed),
            _ => None,
        }
    }

    /// Returns true if the command will not be processed again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, CommandStatus::Completed | CommandStatus::Failed)
    }
}

/// The unit of work tracked by the sync queue.
///
/// A command is created `Pending` when a mutation is first submitted.
/// On remote success it moves to `Completed` and becomes eligible for
/// deletion from the durable store. On remote failure it either stays
/// `Pending` with an incremented retry count or, once the retry budget
/// is spent, moves to `Failed` with an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCommand {
    /// Globally unique identifier.
    pub id: CommandId,
    /// The mutation to replay.
    pub operation: MutationOperation,
    /// Current lifecycle status.
    pub status: CommandStatus,
    /// Number of failed remote attempts so far.
    pub retry_count: u32,
    /// Creation time in unix milliseconds.
    pub created_at: u64,
    /// Most recent execution attempt in unix milliseconds.
    pub last_attempt: Option<u64>,
    /// Failure reason, set only on terminal failure.
    pub error_message: Option<String>,
}

impl SyncCommand {
    /// Creates a new pending command for the given operation.
    #[must_use]
    pub fn new(operation: MutationOperation) -> Self {
        Self {
            id: CommandId::new(),
            operation,
            status: CommandStatus::Pending,
            retry_count: 0,
            created_at: unix_millis(),
            last_attempt: None,
            error_message: None,
        }
    }

    /// Encodes the command to CBOR bytes for the durable store.
    pub fn encode(&self) -> ModelResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ModelError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a command from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> ModelResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ModelError::Decode(e.to_string()))
    }
}
