//! The sync coordinator: local-first writes and lifecycle wiring.

use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncResult;
use crate::events::{SyncEvent, SyncEventFeed};
use crate::local::{LocalStore, LocalStoreError};
use crate::queue::{SyncQueue, SyncStats};
use crate::remote::RemoteMutationService;
use std::sync::{Arc, Weak};
use taskwave_model::{MutationOperation, MutationOutcome, SyncCommand};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The application-facing entry point for offline-resilient mutations.
///
/// `perform_mutation` applies the mutation to the local store first, so
/// the UI stays responsive, then hands a pending command to the queue.
/// Connectivity transitions drive the queue's start/stop lifecycle; the
/// coordinator is one explicit listener on the [`ConnectivityMonitor`],
/// registered via [`watch_connectivity`](Self::watch_connectivity).
///
/// All collaborators are passed in at construction. There is no global
/// instance; tests inject doubles for every seam.
pub struct SyncCoordinator<R: RemoteMutationService, L: LocalStore> {
    local: Arc<L>,
    queue: Arc<SyncQueue<R>>,
    /// Handle to self for the connectivity listener task.
    self_handle: Weak<Self>,
}

impl<R, L> SyncCoordinator<R, L>
where
    R: RemoteMutationService + 'static,
    L: LocalStore + 'static,
{
    /// Creates a coordinator over the given local store and queue.
    ///
    /// Returned behind an `Arc` because the connectivity listener
    /// holds the coordinator across awaits.
    pub fn new(local: L, queue: Arc<SyncQueue<R>>) -> Arc<Self> {
        Arc::new_cyclic(|self_handle| Self {
            local: Arc::new(local),
            queue,
            self_handle: self_handle.clone(),
        })
    }

    /// Returns the local store.
    pub fn local(&self) -> &Arc<L> {
        &self.local
    }

    /// Returns the sync queue.
    pub fn queue(&self) -> &Arc<SyncQueue<R>> {
        &self.queue
    }

    /// Performs a mutation with offline resilience.
    ///
    /// The operation is applied to the local store synchronously first.
    /// If that fails, the error is returned at once and nothing is
    /// queued. Otherwise the mutation is wrapped as a pending command
    /// and delegated to the queue: online callers get the confirmed
    /// remote outcome, offline callers get an optimistic
    /// [`MutationOutcome::Queued`].
    pub async fn perform_mutation(
        &self,
        operation: MutationOperation,
    ) -> SyncResult<MutationOutcome> {
        self.apply_local(&operation)?;

        let command = SyncCommand::new(operation);
        debug!(id = %command.id, kind = ?command.operation.kind(), "mutation applied locally, submitting");
        self.queue.submit(command).await
    }

    fn apply_local(&self, operation: &MutationOperation) -> Result<(), LocalStoreError> {
        match operation {
            MutationOperation::UpdateTodo(todo) => self.local.save_todo(todo),
            MutationOperation::DeleteTodo(id) => self.local.delete_todo(*id),
            MutationOperation::UpdateTag(tag) => self.local.save_tag(tag),
            MutationOperation::DeleteTag(id) => self.local.delete_tag(*id),
        }
    }

    /// Reacts to a connectivity transition.
    ///
    /// Going online starts the periodic drain (which drains once
    /// immediately); going offline stops scheduling new passes.
    pub fn on_connectivity_changed(&self, connected: bool) {
        self.queue.set_online(connected);
        if connected {
            info!("connectivity regained, starting sync queue");
            self.queue.start();
        } else {
            info!("connectivity lost, stopping sync queue");
            self.queue.stop();
        }
    }

    /// Registers this coordinator as a listener on the monitor.
    ///
    /// The current state is applied immediately, then every transition
    /// is forwarded to [`on_connectivity_changed`](Self::on_connectivity_changed)
    /// until the monitor is dropped.
    pub fn watch_connectivity(&self, monitor: &ConnectivityMonitor) -> JoinHandle<()> {
        let mut rx = monitor.subscribe();
        // The coordinator is always constructed behind an Arc, so the
        // upgrade succeeds while `self` is alive.
        let Some(coordinator) = self.self_handle.upgrade() else {
            return tokio::spawn(async {});
        };
        tokio::spawn(async move {
            coordinator.on_connectivity_changed(*rx.borrow_and_update());
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                coordinator.on_connectivity_changed(online);
            }
        })
    }

    /// Returns a snapshot of the queue counters.
    pub fn stats(&self) -> SyncStats {
        self.queue.stats()
    }

    /// Subscribes to terminal sync events.
    #[must_use]
    pub fn subscribe_events(&self) -> std::sync::mpsc::Receiver<SyncEvent> {
        self.queue.events().subscribe()
    }

    /// Returns recent terminal sync events, oldest first.
    #[must_use]
    pub fn recent_events(&self) -> Vec<SyncEvent> {
        self.queue.events().recent()
    }

    /// Returns the event feed itself.
    pub fn events(&self) -> &SyncEventFeed {
        self.queue.events()
    }
}
