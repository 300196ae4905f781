//! The durable operation store.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use crate::record::{read_frame, FrameRead, StoreRecord};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use taskwave_model::{unix_millis, CommandId, CommandStatus, SyncCommand};
use tracing::{debug, warn};

/// Crash-safe persistence for pending sync commands.
///
/// The store keeps an append-only record log on a [`StorageBackend`]
/// and an in-memory index rebuilt by replaying that log on open. Every
/// mutating call runs inside a single transactional boundary: record
/// frames are staged, written with one append and synced, and only then
/// applied to the index. An error on any exit path leaves both the log
/// and the index unchanged.
///
/// Commands are indexed by a monotonically increasing sequence assigned
/// in arrival order, so `list_pending` always yields oldest-first.
///
/// The store never retries anything. Retry policy lives in the sync
/// queue; the store only records its decisions.
pub struct OperationStore {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    backend: Box<dyn StorageBackend>,
    /// Live commands by arrival sequence.
    commands: BTreeMap<u64, SyncCommand>,
    /// Command id to arrival sequence.
    index: HashMap<CommandId, u64>,
    next_seq: u64,
}

impl StoreInner {
    fn contains(&self, id: CommandId) -> bool {
        self.index.contains_key(&id)
    }

    fn get_mut(&mut self, id: CommandId) -> Option<&mut SyncCommand> {
        let seq = *self.index.get(&id)?;
        self.commands.get_mut(&seq)
    }

    /// Folds one record into the index. Used both for replay on open
    /// and for applying a committed transaction.
    fn apply(&mut self, record: &StoreRecord) {
        match record {
            StoreRecord::Append { command } => {
                if self.contains(command.id) {
                    warn!(id = %command.id, "skipping append for duplicate command");
                    return;
                }
                let seq = self.next_seq;
                self.next_seq += 1;
                self.index.insert(command.id, seq);
                self.commands.insert(seq, command.clone());
            }

            StoreRecord::Retry {
                id,
                retry_count,
                last_attempt,
            } => {
                if let Some(command) = self.get_mut(*id) {
                    command.retry_count = *retry_count;
                    command.last_attempt = Some(*last_attempt);
                } else {
                    warn!(%id, "retry record for unknown command");
                }
            }

            StoreRecord::Completed { id } => {
                if let Some(seq) = self.index.remove(id) {
                    self.commands.remove(&seq);
                } else {
                    warn!(%id, "completed record for unknown command");
                }
            }

            StoreRecord::Failed {
                id,
                retry_count,
                last_attempt,
                message,
            } => {
                if let Some(command) = self.get_mut(*id) {
                    command.status = CommandStatus::Failed;
                    command.retry_count = *retry_count;
                    command.last_attempt = Some(*last_attempt);
                    command.error_message = Some(message.clone());
                } else {
                    warn!(%id, "failed record for unknown command");
                }
            }
        }
    }
}

/// Staged changes of one transaction: encoded frames plus the records
/// to fold into the index once the frames are durable.
struct StoreTxn {
    frames: Vec<u8>,
    staged: Vec<StoreRecord>,
}

impl StoreTxn {
    fn new() -> Self {
        Self {
            frames: Vec::new(),
            staged: Vec::new(),
        }
    }

    fn stage(&mut self, record: StoreRecord) -> StoreResult<()> {
        self.frames.extend_from_slice(&record.encode_frame()?);
        self.staged.push(record);
        Ok(())
    }
}

impl OperationStore {
    /// Opens a store over the given backend, replaying the existing log.
    ///
    /// A torn or corrupt frame marks the end of the readable log; the
    /// backend is truncated to the last good frame and the rest is
    /// discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or truncated.
    pub fn open<B: StorageBackend + 'static>(backend: B) -> StoreResult<Self> {
        let backend: Box<dyn StorageBackend> = Box::new(backend);
        let size = backend.size()?;
        let data = backend.read_at(0, size as usize)?;

        let mut inner = StoreInner {
            backend,
            commands: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 1,
        };

        let mut offset = 0usize;
        loop {
            match read_frame(&data[offset..]) {
                FrameRead::End => break,
                FrameRead::Frame(record, consumed) => {
                    inner.apply(&record);
                    offset += consumed;
                }
                FrameRead::Invalid(reason) => {
                    warn!(offset, %reason, "discarding unreadable tail of operation log");
                    inner.backend.truncate(offset as u64)?;
                    inner.backend.sync()?;
                    break;
                }
            }
        }

        debug!(
            live = inner.commands.len(),
            "operation store opened"
        );

        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Runs staged mutations as one commit-or-rollback unit.
    ///
    /// The closure stages records against the current state. On success
    /// all frames are written with a single append, synced, and folded
    /// into the index. On any error nothing is written and nothing is
    /// applied.
    fn in_transaction<T>(
        &self,
        f: impl FnOnce(&StoreInner, &mut StoreTxn) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut inner = self.inner.lock();
        let mut txn = StoreTxn::new();

        let value = f(&inner, &mut txn)?;

        if txn.frames.is_empty() {
            return Ok(value);
        }

        inner.backend.append(&txn.frames)?;
        inner.backend.sync()?;

        for record in &txn.staged {
            inner.apply(record);
        }

        Ok(value)
    }

    /// Inserts a new command with its current state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateCommand`] if the id is already
    /// present, or a storage/codec error if the write fails.
    pub fn append(&self, command: &SyncCommand) -> StoreResult<()> {
        self.in_transaction(|inner, txn| {
            if inner.contains(command.id) {
                return Err(StoreError::DuplicateCommand(command.id));
            }
            txn.stage(StoreRecord::Append {
                command: command.clone(),
            })
        })
    }

    /// Returns all pending commands, oldest first.
    ///
    /// Creation order is what preserves causality for multiple offline
    /// edits to the same entity.
    pub fn list_pending(&self) -> StoreResult<Vec<SyncCommand>> {
        let inner = self.inner.lock();
        Ok(inner
            .commands
            .values()
            .filter(|c| c.status == CommandStatus::Pending)
            .cloned()
            .collect())
    }

    /// Returns all terminally failed commands, oldest first.
    pub fn list_failed(&self) -> StoreResult<Vec<SyncCommand>> {
        let inner = self.inner.lock();
        Ok(inner
            .commands
            .values()
            .filter(|c| c.status == CommandStatus::Failed)
            .cloned()
            .collect())
    }

    /// Returns the number of pending commands.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner
            .lock()
            .commands
            .values()
            .filter(|c| c.status == CommandStatus::Pending)
            .count()
    }

    /// Returns true if the store holds no commands at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().commands.is_empty()
    }

    /// Removes a confirmed command from the store.
    ///
    /// Once marked, the command is never returned by `list_pending`
    /// again.
    pub fn mark_completed(&self, id: CommandId) -> StoreResult<()> {
        self.in_transaction(|inner, txn| {
            if !inner.contains(id) {
                return Err(StoreError::UnknownCommand(id));
            }
            txn.stage(StoreRecord::Completed { id })
        })
    }

    /// Records a failed attempt, keeping the command pending.
    pub fn update_retry(&self, id: CommandId, retry_count: u32) -> StoreResult<()> {
        self.in_transaction(|inner, txn| {
            if !inner.contains(id) {
                return Err(StoreError::UnknownCommand(id));
            }
            txn.stage(StoreRecord::Retry {
                id,
                retry_count,
                last_attempt: unix_millis(),
            })
        })
    }

    /// Marks a command as terminally failed.
    ///
    /// `retry_count` is the number of attempts actually made, so the
    /// durable record reflects the exhausted budget. Failed commands
    /// are excluded from `list_pending` but kept for inspection.
    pub fn mark_failed(&self, id: CommandId, retry_count: u32, message: &str) -> StoreResult<()> {
        self.in_transaction(|inner, txn| {
            if !inner.contains(id) {
                return Err(StoreError::UnknownCommand(id));
            }
            txn.stage(StoreRecord::Failed {
                id,
                retry_count,
                last_attempt: unix_millis(),
                message: message.to_string(),
            })
        })
    }

    /// Rewrites the log keeping only live commands.
    ///
    /// Completed commands and superseded retry records disappear from
    /// disk; pending and failed commands are rewritten in arrival
    /// order with their current state.
    pub fn compact(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();

        let mut frames = Vec::new();
        for command in inner.commands.values() {
            let record = StoreRecord::Append {
                command: command.clone(),
            };
            frames.extend_from_slice(&record.encode_frame()?);
        }

        inner.backend.truncate(0)?;
        if !frames.is_empty() {
            inner.backend.append(&frames)?;
        }
        inner.backend.sync()?;

        debug!(live = inner.commands.len(), "operation log compacted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileBackend;
    use crate::memory::InMemoryBackend;
    use taskwave_model::{MutationOperation, TagSnapshot, TodoSnapshot};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn todo_command(title: &str) -> SyncCommand {
        SyncCommand::new(MutationOperation::UpdateTodo(TodoSnapshot::new(
            Uuid::new_v4(),
            title,
            1,
        )))
    }

    fn tag_delete_command() -> SyncCommand {
        SyncCommand::new(MutationOperation::DeleteTag(Uuid::new_v4()))
    }

    fn memory_store() -> OperationStore {
        OperationStore::open(InMemoryBackend::new()).unwrap()
    }

    #[test]
    fn append_and_list_in_creation_order() {
        let store = memory_store();

        let a = todo_command("first");
        let b = tag_delete_command();
        let c = todo_command("third");

        store.append(&a).unwrap();
        store.append(&b).unwrap();
        store.append(&c).unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].id, a.id);
        assert_eq!(pending[1].id, b.id);
        assert_eq!(pending[2].id, c.id);
    }

    #[test]
    fn duplicate_append_rejected() {
        let store = memory_store();
        let command = todo_command("once");

        store.append(&command).unwrap();
        let result = store.append(&command);
        assert!(matches!(result, Err(StoreError::DuplicateCommand(id)) if id == command.id));

        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn completed_commands_leave_pending() {
        let store = memory_store();
        let a = todo_command("done");
        let b = todo_command("still here");

        store.append(&a).unwrap();
        store.append(&b).unwrap();
        store.mark_completed(a.id).unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
        assert!(!store.is_empty());
    }

    #[test]
    fn update_retry_keeps_pending_and_order() {
        let store = memory_store();
        let a = todo_command("a");
        let b = todo_command("b");

        store.append(&a).unwrap();
        store.append(&b).unwrap();
        store.update_retry(a.id, 2).unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, a.id);
        assert_eq!(pending[0].retry_count, 2);
        assert!(pending[0].last_attempt.is_some());
        assert_eq!(pending[0].status, CommandStatus::Pending);
    }

    #[test]
    fn mark_failed_excludes_and_records() {
        let store = memory_store();
        let command = todo_command("doomed");

        store.append(&command).unwrap();
        store.mark_failed(command.id, 3, "server said no").unwrap();

        assert!(store.list_pending().unwrap().is_empty());

        let failed = store.list_failed().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, CommandStatus::Failed);
        assert_eq!(failed[0].retry_count, 3);
        assert_eq!(failed[0].error_message.as_deref(), Some("server said no"));
    }

    #[test]
    fn unknown_command_errors() {
        let store = memory_store();
        let id = CommandId::new();

        assert!(matches!(
            store.mark_completed(id),
            Err(StoreError::UnknownCommand(_))
        ));
        assert!(matches!(
            store.update_retry(id, 1),
            Err(StoreError::UnknownCommand(_))
        ));
        assert!(matches!(
            store.mark_failed(id, 3, "nope"),
            Err(StoreError::UnknownCommand(_))
        ));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ops.log");

        let a = todo_command("keep");
        let b = SyncCommand::new(MutationOperation::UpdateTag(TagSnapshot::new(
            Uuid::new_v4(),
            "urgent",
            "FF0000",
            5,
        )));
        let c = todo_command("gone");

        {
            let store = OperationStore::open(FileBackend::open(&path).unwrap()).unwrap();
            store.append(&a).unwrap();
            store.append(&b).unwrap();
            store.append(&c).unwrap();
            store.update_retry(a.id, 1).unwrap();
            store.mark_completed(c.id).unwrap();
            store.mark_failed(b.id, 3, "gave up").unwrap();
        }

        let store = OperationStore::open(FileBackend::open(&path).unwrap()).unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);
        assert_eq!(pending[0].retry_count, 1);

        let failed = store.list_failed().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, b.id);
        assert_eq!(failed[0].error_message.as_deref(), Some("gave up"));
    }

    #[test]
    fn torn_append_is_invisible_after_reopen() {
        let good = todo_command("committed");
        let torn = todo_command("never committed");

        let good_frame = StoreRecord::Append {
            command: good.clone(),
        }
        .encode_frame()
        .unwrap();
        let torn_frame = StoreRecord::Append { command: torn }.encode_frame().unwrap();

        // Simulate a crash halfway through the second append.
        let mut data = good_frame.clone();
        data.extend_from_slice(&torn_frame[..torn_frame.len() / 2]);

        let store = OperationStore::open(InMemoryBackend::with_data(data)).unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, good.id);
    }

    #[test]
    fn garbage_tail_is_discarded_and_log_stays_usable() {
        let good = todo_command("survivor");
        let mut data = StoreRecord::Append {
            command: good.clone(),
        }
        .encode_frame()
        .unwrap();
        data.extend_from_slice(b"not a frame at all");

        let store = OperationStore::open(InMemoryBackend::with_data(data)).unwrap();
        assert_eq!(store.pending_count(), 1);

        // The tail was truncated, so new appends land on a clean log.
        let next = todo_command("after recovery");
        store.append(&next).unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].id, next.id);
    }

    #[test]
    fn compact_drops_completed_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ops.log");

        let keep = todo_command("keep");
        let done = todo_command("done");
        let dead = todo_command("dead");

        {
            let store = OperationStore::open(FileBackend::open(&path).unwrap()).unwrap();
            store.append(&keep).unwrap();
            store.append(&done).unwrap();
            store.append(&dead).unwrap();
            store.mark_completed(done.id).unwrap();
            store.mark_failed(dead.id, 3, "timeout").unwrap();

            let before = std::fs::metadata(&path).unwrap().len();
            store.compact().unwrap();
            let after = std::fs::metadata(&path).unwrap().len();
            assert!(after < before);
        }

        // Pending and failed survive with their state; completed is gone.
        let store = OperationStore::open(FileBackend::open(&path).unwrap()).unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, keep.id);

        let failed = store.list_failed().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, dead.id);
        assert_eq!(failed[0].retry_count, 3);
    }
}
