//! Entity snapshots.
//!
//! Mutations embed a full snapshot of the entity at mutation time. The
//! local state may keep changing while a command sits in the offline
//! queue; replay must not depend on it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A full snapshot of a todo at mutation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoSnapshot {
    /// Entity id.
    pub id: Uuid,
    /// Title shown in lists.
    pub title: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Tags attached to this todo.
    pub tag_ids: Vec<Uuid>,
    /// Due time in unix milliseconds.
    pub due_at: Option<u64>,
    /// Whether the todo is completed.
    pub completed: bool,
    /// Last local modification in unix milliseconds.
    pub updated_at: u64,
}

impl TodoSnapshot {
    /// Creates a minimal snapshot with the given id and title.
    pub fn new(id: Uuid, title: impl Into<String>, updated_at: u64) -> Self {
        Self {
            id,
            title: title.into(),
            notes: None,
            tag_ids: Vec::new(),
            due_at: None,
            completed: false,
            updated_at,
        }
    }
}

/// A full snapshot of a tag at mutation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSnapshot {
    /// Entity id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Hex color, e.g. `"FF8800"`.
    pub color: String,
    /// Last local modification in unix milliseconds.
    pub updated_at: u64,
}

impl TagSnapshot {
    /// Creates a snapshot with the given id, name and color.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        color: impl Into<String>,
        updated_at: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            updated_at,
        }
    }
}
