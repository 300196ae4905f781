//! Local read/write store abstraction.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use taskwave_model::{TagSnapshot, TodoSnapshot};
use thiserror::Error;
use uuid::Uuid;

/// Result type for local store operations.
pub type LocalResult<T> = Result<T, LocalStoreError>;

/// Errors from the optimistic local write.
///
/// Fatal to the current mutation: the coordinator surfaces them
/// immediately and queues nothing.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    /// The write or delete failed at the storage layer.
    #[error("local storage error: {0}")]
    Storage(String),

    /// The entity violates a local constraint.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// The local read/write store mutations are applied to before any
/// network activity.
///
/// Each call runs in its own transaction; implementations must be fast
/// since the coordinator blocks on them synchronously.
pub trait LocalStore: Send + Sync {
    /// Saves a todo snapshot.
    fn save_todo(&self, todo: &TodoSnapshot) -> LocalResult<()>;

    /// Deletes a todo by id.
    fn delete_todo(&self, id: Uuid) -> LocalResult<()>;

    /// Saves a tag snapshot.
    fn save_tag(&self, tag: &TagSnapshot) -> LocalResult<()>;

    /// Deletes a tag by id.
    fn delete_tag(&self, id: Uuid) -> LocalResult<()>;
}

/// An in-memory local store for testing.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    todos: RwLock<HashMap<Uuid, TodoSnapshot>>,
    tags: RwLock<HashMap<Uuid, TagSnapshot>>,
    fail_writes: AtomicBool,
}

impl MemoryLocalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, to exercise the
    /// local-failure path.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the stored todo, if any.
    #[must_use]
    pub fn todo(&self, id: Uuid) -> Option<TodoSnapshot> {
        self.todos.read().get(&id).cloned()
    }

    /// Returns the stored tag, if any.
    #[must_use]
    pub fn tag(&self, id: Uuid) -> Option<TagSnapshot> {
        self.tags.read().get(&id).cloned()
    }

    /// Returns the number of stored todos.
    #[must_use]
    pub fn todo_count(&self) -> usize {
        self.todos.read().len()
    }

    fn check(&self) -> LocalResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(LocalStoreError::Storage("injected write failure".into()))
        } else {
            Ok(())
        }
    }
}

impl LocalStore for MemoryLocalStore {
    fn save_todo(&self, todo: &TodoSnapshot) -> LocalResult<()> {
        self.check()?;
        self.todos.write().insert(todo.id, todo.clone());
        Ok(())
    }

    fn delete_todo(&self, id: Uuid) -> LocalResult<()> {
        self.check()?;
        self.todos.write().remove(&id);
        Ok(())
    }

    fn save_tag(&self, tag: &TagSnapshot) -> LocalResult<()> {
        self.check()?;
        self.tags.write().insert(tag.id, tag.clone());
        Ok(())
    }

    fn delete_tag(&self, id: Uuid) -> LocalResult<()> {
        self.check()?;
        self.tags.write().remove(&id);
        Ok(())
    }
}
