//! Mutation operations.

use crate::error::{ModelError, ModelResult};
use crate::snapshot::{TagSnapshot, TodoSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of mutation, independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A todo was created or updated.
    UpdateTodo,
    /// A todo was deleted.
    DeleteTodo,
    /// A tag was created or updated.
    UpdateTag,
    /// A tag was deleted.
    DeleteTag,
}

impl OperationKind {
    /// Converts to a numeric code for durable encoding.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            OperationKind::UpdateTodo => 1,
            OperationKind::DeleteTodo => 2,
            OperationKind::UpdateTag => 3,
            OperationKind::DeleteTag => 4,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(OperationKind::UpdateTodo),
            2 => Some(OperationKind::DeleteTodo),
            3 => Some(OperationKind::UpdateTag),
            4 => Some(OperationKind::DeleteTag),
            _ => None,
        }
    }
}

/// A single mutation against a domain entity.
///
/// Exactly one variant is active. Update variants carry a full snapshot
/// of the entity at mutation time, not a diff, so a queued operation can
/// be replayed long after local state has moved on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationOperation {
    /// Create or update a todo.
    UpdateTodo(TodoSnapshot),
    /// Delete a todo by id.
    DeleteTodo(Uuid),
    /// Create or update a tag.
    UpdateTag(TagSnapshot),
    /// Delete a tag by id.
    DeleteTag(Uuid),
}

impl MutationOperation {
    /// Returns the operation kind.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::UpdateTodo(_) => OperationKind::UpdateTodo,
            Self::DeleteTodo(_) => OperationKind::DeleteTodo,
            Self::UpdateTag(_) => OperationKind::UpdateTag,
            Self::DeleteTag(_) => OperationKind::DeleteTag,
        }
    }

    /// Returns the id of the entity this mutation targets.
    #[must_use]
    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::UpdateTodo(todo) => todo.id,
            Self::DeleteTodo(id) => *id,
            Self::UpdateTag(tag) => tag.id,
            Self::DeleteTag(id) => *id,
        }
    }

    /// Encodes the operation to CBOR bytes.
    pub fn encode(&self) -> ModelResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ModelError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes an operation from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> ModelResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ModelError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_roundtrip() {
        for kind in [
            OperationKind::UpdateTodo,
            OperationKind::DeleteTodo,
            OperationKind::UpdateTag,
            OperationKind::DeleteTag,
        ] {
            assert_eq!(OperationKind::from_code(kind.to_code()), Some(kind));
        }
        assert_eq!(OperationKind::from_code(0), None);
    }

    #[test]
    fn entity_id_matches_payload() {
        let id = Uuid::new_v4();
        let op = MutationOperation::UpdateTodo(TodoSnapshot::new(id, "a", 1));
        assert_eq!(op.entity_id(), id);
        assert_eq!(op.kind(), OperationKind::UpdateTodo);

        let op = MutationOperation::DeleteTag(id);
        assert_eq!(op.entity_id(), id);
        assert_eq!(op.kind(), OperationKind::DeleteTag);
    }

    #[test]
    fn operation_cbor_roundtrip() {
        let id = Uuid::new_v4();
        let mut todo = TodoSnapshot::new(id, "write report", 42);
        todo.notes = Some("for monday".into());
        todo.tag_ids = vec![Uuid::new_v4()];

        let op = MutationOperation::UpdateTodo(todo);
        let bytes = op.encode().unwrap();
        let decoded = MutationOperation::decode(&bytes).unwrap();
        assert_eq!(op, decoded);
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(MutationOperation::decode(&[0xFF, 0x00, 0x13]).is_err());
    }
}
