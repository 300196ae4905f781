//! The sync queue: immediate-vs-deferred execution and the retry loop.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::events::{SyncEvent, SyncEventFeed};
use crate::remote::RemoteMutationService;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use taskwave_model::{unix_millis, CommandStatus, MutationOperation, MutationOutcome, SyncCommand};
use taskwave_store::OperationStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters describing queue activity since construction.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Commands submitted through the queue.
    pub commands_submitted: u64,
    /// Commands confirmed by the server.
    pub commands_completed: u64,
    /// Failed attempts that stayed within the retry budget.
    pub retries: u64,
    /// Commands that exhausted their retry budget.
    pub commands_failed: u64,
    /// Most recent error, if any.
    pub last_error: Option<String>,
}

/// Decides immediate-vs-deferred execution and owns the replay loop.
///
/// Online, a submitted command executes against the remote service at
/// once. Offline, it is serialized into the durable operation store and
/// replayed later by the periodic drain, which processes commands
/// sequentially in creation order and retries each up to the configured
/// budget.
///
/// `start`/`stop` control the drain timer. Stopping never interrupts a
/// pass in flight; the current pass finishes and no further ones are
/// scheduled.
pub struct SyncQueue<R: RemoteMutationService> {
    config: SyncConfig,
    remote: Arc<R>,
    store: Arc<OperationStore>,
    online: AtomicBool,
    /// True while the periodic drain should keep running.
    run_flag: watch::Sender<bool>,
    drain_task: Mutex<Option<JoinHandle<()>>>,
    /// Serializes drain passes so submit-triggered and timer-triggered
    /// drains cannot interleave.
    drain_lock: tokio::sync::Mutex<()>,
    stats: RwLock<SyncStats>,
    events: SyncEventFeed,
    /// Handle to self for the spawned drain task.
    self_handle: Weak<Self>,
}

impl<R: RemoteMutationService + 'static> SyncQueue<R> {
    /// Creates a new queue over the given remote service and store.
    ///
    /// Returned behind an `Arc` because the drain task holds the queue
    /// across awaits. The queue starts offline and idle; connectivity
    /// handling flips it online and starts the drain timer.
    pub fn new(config: SyncConfig, remote: R, store: OperationStore) -> Arc<Self> {
        let (run_flag, _) = watch::channel(false);
        Arc::new_cyclic(|self_handle| Self {
            config,
            remote: Arc::new(remote),
            store: Arc::new(store),
            online: AtomicBool::new(false),
            run_flag,
            drain_task: Mutex::new(None),
            drain_lock: tokio::sync::Mutex::new(()),
            stats: RwLock::new(SyncStats::default()),
            events: SyncEventFeed::new(),
            self_handle: self_handle.clone(),
        })
    }

    /// Returns the remote service.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Returns the durable operation store.
    pub fn store(&self) -> &Arc<OperationStore> {
        &self.store
    }

    /// Returns a snapshot of the queue counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the terminal-outcome event feed.
    pub fn events(&self) -> &SyncEventFeed {
        &self.events
    }

    /// Updates the shared connectivity flag.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns the current connectivity flag.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Submits a command for execution.
    ///
    /// Online, the command executes against the remote service now and
    /// the confirmed outcome is returned. Offline, the command is
    /// persisted durably and accepted optimistically; the caller must
    /// not block on remote confirmation.
    ///
    /// A retryable transport failure on the immediate path is not a
    /// hard failure either: the command falls back to the durable queue
    /// with its first attempt counted. Non-retryable errors propagate.
    pub async fn submit(&self, mut command: SyncCommand) -> SyncResult<MutationOutcome> {
        self.stats.write().commands_submitted += 1;

        if !self.is_online() {
            self.store.append(&command)?;
            debug!(id = %command.id, kind = ?command.operation.kind(), "queued mutation while offline");
            return Ok(MutationOutcome::Queued(command.id));
        }

        command.status = CommandStatus::InProgress;
        command.last_attempt = Some(unix_millis());

        match self.execute_remote(&command).await {
            Ok(outcome) => {
                self.stats.write().commands_completed += 1;
                Ok(outcome)
            }
            Err(e) if e.is_retryable() => {
                debug!(id = %command.id, error = %e, "immediate execution failed, deferring to durable queue");
                command.status = CommandStatus::Pending;
                command.retry_count = 1;
                self.store.append(&command)?;
                Ok(MutationOutcome::Queued(command.id))
            }
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Dispatches a command's operation to the matching remote call.
    pub async fn execute_remote(&self, command: &SyncCommand) -> SyncResult<MutationOutcome> {
        match &command.operation {
            MutationOperation::UpdateTodo(todo) => {
                let confirmed = self.remote.update_todo(todo).await?;
                Ok(MutationOutcome::Todo(confirmed))
            }
            MutationOperation::DeleteTodo(id) => {
                Ok(MutationOutcome::Deleted(self.remote.delete_todo(*id).await?))
            }
            MutationOperation::UpdateTag(tag) => {
                let confirmed = self.remote.update_tag(tag).await?;
                Ok(MutationOutcome::Tag(confirmed))
            }
            MutationOperation::DeleteTag(id) => {
                Ok(MutationOutcome::Deleted(self.remote.delete_tag(*id).await?))
            }
        }
    }

    /// Starts the periodic drain, draining once immediately.
    ///
    /// Idempotent: calling while the drain task is alive only requests
    /// an extra pass.
    pub fn start(&self) {
        let Some(queue) = self.self_handle.upgrade() else {
            return;
        };

        let mut task = self.drain_task.lock();
        self.run_flag.send_replace(true);

        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("drain task already running");
            return;
        }

        let mut run_rx = self.run_flag.subscribe();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(queue.config.drain_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; consume it so every
            // pass below is followed by a full interval.
            ticker.tick().await;

            loop {
                queue.drain_pending().await;

                // Stop requested while the pass was running.
                if !*run_rx.borrow_and_update() {
                    break;
                }

                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = run_rx.changed() => {
                        if changed.is_err() || !*run_rx.borrow_and_update() {
                            break;
                        }
                    }
                }
            }
            debug!("drain task exited");
        }));

        info!("sync queue started");
    }

    /// Cancels the periodic drain without interrupting a pass in
    /// flight. Idempotent.
    pub fn stop(&self) {
        if self.run_flag.send_replace(false) {
            info!("sync queue stopping after current pass");
        }
    }

    /// Returns true while the drain task is alive.
    pub fn is_running(&self) -> bool {
        self.drain_task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Replays all pending commands against the remote service.
    ///
    /// Remote failures are converted into retry bookkeeping, never
    /// propagated. Storage failures are logged and leave the affected
    /// command as it was, safe for the next pass. When nothing remains
    /// pending afterwards, the periodic timer is stopped and the log
    /// compacted.
    pub async fn drain_pending(&self) {
        let _pass = self.drain_lock.lock().await;

        if !self.is_online() {
            debug!("skipping drain while offline");
            return;
        }

        let pending = match self.store.list_pending() {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "could not read pending commands");
                return;
            }
        };

        if !pending.is_empty() {
            debug!(count = pending.len(), "draining pending commands");
        }

        let mut remaining = pending.len();

        // Sequential on purpose: parallel replay could reorder
        // conflicting edits to the same entity.
        for mut command in pending {
            command.status = CommandStatus::InProgress;

            match self.execute_remote(&command).await {
                Ok(_) => match self.store.mark_completed(command.id) {
                    Ok(()) => {
                        remaining -= 1;
                        self.stats.write().commands_completed += 1;
                        self.events.emit(SyncEvent::Completed { id: command.id });
                    }
                    Err(e) => {
                        warn!(id = %command.id, error = %e, "could not mark command completed");
                    }
                },
                Err(e) => self.record_failure(&command, &e, &mut remaining),
            }
        }

        if remaining == 0 {
            debug!("no commands left pending, stopping periodic drain");
            self.stop();
            if let Err(e) = self.store.compact() {
                warn!(error = %e, "operation log compaction failed");
            }
        }
    }

    /// Books a failed attempt: another retry if budget remains,
    /// terminal failure otherwise.
    fn record_failure(&self, command: &SyncCommand, error: &SyncError, remaining: &mut usize) {
        let attempts = command.retry_count + 1;

        if attempts >= self.config.max_retries {
            match self.store.mark_failed(command.id, attempts, &error.to_string()) {
                Ok(()) => {
                    *remaining -= 1;
                    let exhausted = SyncError::RetryExhausted {
                        id: command.id,
                        attempts,
                    };
                    warn!(id = %command.id, attempts, error = %error, "command failed permanently");
                    {
                        let mut stats = self.stats.write();
                        stats.commands_failed += 1;
                        stats.last_error = Some(exhausted.to_string());
                    }
                    self.events.emit(SyncEvent::RetryExhausted {
                        id: command.id,
                        attempts,
                        error: error.to_string(),
                    });
                }
                Err(e) => {
                    warn!(id = %command.id, error = %e, "could not mark command failed");
                }
            }
        } else {
            match self.store.update_retry(command.id, attempts) {
                Ok(()) => {
                    self.stats.write().retries += 1;
                    debug!(id = %command.id, attempts, error = %error, "remote attempt failed, will retry");
                }
                Err(e) => {
                    warn!(id = %command.id, error = %e, "could not record retry attempt");
                }
            }
        }
    }
}
