//! Remote mutation service abstraction.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use taskwave_model::{TagSnapshot, TodoSnapshot};
use uuid::Uuid;

/// The remote CRUD surface the queue replays mutations against.
///
/// One async call per (entity, action) pair. Each returns the
/// server-confirmed entity or id, or a typed transport error. The
/// service is opaque; retries and scheduling are the queue's
/// responsibility, never the service's.
#[async_trait]
pub trait RemoteMutationService: Send + Sync {
    /// Creates or updates a todo on the server.
    async fn update_todo(&self, todo: &TodoSnapshot) -> SyncResult<TodoSnapshot>;

    /// Deletes a todo on the server.
    async fn delete_todo(&self, id: Uuid) -> SyncResult<Uuid>;

    /// Creates or updates a tag on the server.
    async fn update_tag(&self, tag: &TagSnapshot) -> SyncResult<TagSnapshot>;

    /// Deletes a tag on the server.
    async fn delete_tag(&self, id: Uuid) -> SyncResult<Uuid>;
}

/// A remote call observed by [`MockRemoteService`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// `update_todo` was invoked.
    UpdateTodo(TodoSnapshot),
    /// `delete_todo` was invoked.
    DeleteTodo(Uuid),
    /// `update_tag` was invoked.
    UpdateTag(TagSnapshot),
    /// `delete_tag` was invoked.
    DeleteTag(Uuid),
}

/// A mock remote service for testing.
///
/// Records every attempted call and can be scripted to fail: a bounded
/// number of upcoming calls, or every call, with retryable or fatal
/// transport errors.
#[derive(Debug, Default)]
pub struct MockRemoteService {
    calls: Mutex<Vec<RemoteCall>>,
    fail_remaining: AtomicU32,
    always_fail: AtomicBool,
    fatal: AtomicBool,
}

impl MockRemoteService {
    /// Creates a mock that confirms every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` calls with a retryable transport error.
    pub fn fail_next(&self, count: u32) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Fails every call until turned off again.
    pub fn set_always_fail(&self, always: bool) {
        self.always_fail.store(always, Ordering::SeqCst);
    }

    /// Makes scripted failures non-retryable.
    pub fn set_fatal(&self, fatal: bool) {
        self.fatal.store(fatal, Ordering::SeqCst);
    }

    /// Returns all attempted calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of attempted calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, call: RemoteCall) -> SyncResult<()> {
        self.calls.lock().push(call);

        let fail = self.always_fail.load(Ordering::SeqCst)
            || self
                .fail_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();

        if fail {
            if self.fatal.load(Ordering::SeqCst) {
                Err(SyncError::transport_fatal("mock remote rejected request"))
            } else {
                Err(SyncError::transport_retryable("mock remote unavailable"))
            }
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteMutationService for MockRemoteService {
    async fn update_todo(&self, todo: &TodoSnapshot) -> SyncResult<TodoSnapshot> {
        self.record(RemoteCall::UpdateTodo(todo.clone()))?;
        Ok(todo.clone())
    }

    async fn delete_todo(&self, id: Uuid) -> SyncResult<Uuid> {
        self.record(RemoteCall::DeleteTodo(id))?;
        Ok(id)
    }

    async fn update_tag(&self, tag: &TagSnapshot) -> SyncResult<TagSnapshot> {
        self.record(RemoteCall::UpdateTag(tag.clone()))?;
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: Uuid) -> SyncResult<Uuid> {
        self.record(RemoteCall::DeleteTag(id))?;
        Ok(id)
    }
}
