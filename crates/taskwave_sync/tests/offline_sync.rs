//! End-to-end tests for the offline mutation sync engine.

use std::sync::Arc;
use std::time::Duration;
use taskwave_model::{MutationOperation, MutationOutcome, TagSnapshot, TodoSnapshot};
use taskwave_store::{FileBackend, InMemoryBackend, OperationStore};
use taskwave_sync::{
    ConnectivityMonitor, MemoryLocalStore, MockRemoteService, RemoteCall, SyncConfig,
    SyncCoordinator, SyncEvent, SyncQueue,
};
use uuid::Uuid;

type TestCoordinator = Arc<SyncCoordinator<MockRemoteService, MemoryLocalStore>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn coordinator_over(store: OperationStore) -> TestCoordinator {
    let config = SyncConfig::new().with_drain_interval(Duration::from_millis(20));
    let queue = SyncQueue::new(config, MockRemoteService::new(), store);
    SyncCoordinator::new(MemoryLocalStore::new(), queue)
}

fn memory_coordinator() -> TestCoordinator {
    coordinator_over(OperationStore::open(InMemoryBackend::new()).unwrap())
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition was not reached within the deadline");
}

#[tokio::test]
async fn offline_edits_replay_in_submission_order() {
    init_tracing();
    let coordinator = memory_coordinator();
    let monitor = ConnectivityMonitor::new(false);
    let _listener = coordinator.watch_connectivity(&monitor);

    let todo_id = Uuid::new_v4();

    // Two edits to the same todo while offline.
    let first = coordinator
        .perform_mutation(MutationOperation::UpdateTodo(TodoSnapshot::new(
            todo_id, "A", 1,
        )))
        .await
        .unwrap();
    let second = coordinator
        .perform_mutation(MutationOperation::UpdateTodo(TodoSnapshot::new(
            todo_id, "B", 2,
        )))
        .await
        .unwrap();

    assert!(!first.is_confirmed());
    assert!(!second.is_confirmed());
    assert_eq!(coordinator.queue().remote().call_count(), 0);
    assert_eq!(coordinator.queue().store().pending_count(), 2);

    // Reconnect and let the drain replay both.
    monitor.set_online(true);
    wait_until(|| coordinator.queue().store().pending_count() == 0).await;

    let calls = coordinator.queue().remote().calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], RemoteCall::UpdateTodo(t) if t.title == "A"));
    assert!(matches!(&calls[1], RemoteCall::UpdateTodo(t) if t.title == "B"));

    // The local store reflects the latest edit.
    assert_eq!(coordinator.local().todo(todo_id).unwrap().title, "B");
}

#[tokio::test]
async fn online_delete_confirms_synchronously() {
    init_tracing();
    let coordinator = memory_coordinator();
    coordinator.on_connectivity_changed(true);

    let tag_id = Uuid::new_v4();
    let outcome = coordinator
        .perform_mutation(MutationOperation::DeleteTag(tag_id))
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Deleted(tag_id));
    assert!(coordinator.queue().store().is_empty());
    assert_eq!(
        coordinator.queue().remote().calls(),
        vec![RemoteCall::DeleteTag(tag_id)]
    );
}

#[tokio::test]
async fn failing_remote_exhausts_retries_and_notifies() {
    init_tracing();
    let coordinator = memory_coordinator();
    let monitor = ConnectivityMonitor::new(false);
    let _listener = coordinator.watch_connectivity(&monitor);

    coordinator.queue().remote().set_always_fail(true);
    let events = coordinator.subscribe_events();

    let outcome = coordinator
        .perform_mutation(MutationOperation::UpdateTag(TagSnapshot::new(
            Uuid::new_v4(),
            "urgent",
            "FF0000",
            1,
        )))
        .await
        .unwrap();
    let command_id = outcome.queued_id().unwrap();

    monitor.set_online(true);
    wait_until(|| !coordinator.queue().store().list_failed().unwrap().is_empty()).await;

    let failed = coordinator.queue().store().list_failed().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, command_id);
    assert_eq!(failed[0].retry_count, 3);
    assert!(failed[0].error_message.is_some());
    assert!(coordinator.queue().store().list_pending().unwrap().is_empty());

    // Exactly three attempts, and a further drain makes no more.
    assert_eq!(coordinator.queue().remote().call_count(), 3);
    coordinator.queue().drain_pending().await;
    assert_eq!(coordinator.queue().remote().call_count(), 3);

    // The failure is surfaced as a user-notifiable event, and the
    // optimistic local write is not rolled back.
    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(
        event,
        SyncEvent::RetryExhausted { id, attempts: 3, .. } if id == command_id
    ));
    assert_eq!(coordinator.stats().commands_failed, 1);
}

#[tokio::test]
async fn queued_mutations_survive_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending.log");

    let todo_id = Uuid::new_v4();

    // First process lifetime: two mutations while offline, then "crash".
    {
        let store = OperationStore::open(FileBackend::open(&path).unwrap()).unwrap();
        let coordinator = coordinator_over(store);

        coordinator
            .perform_mutation(MutationOperation::UpdateTodo(TodoSnapshot::new(
                todo_id, "draft", 1,
            )))
            .await
            .unwrap();
        coordinator
            .perform_mutation(MutationOperation::UpdateTodo(TodoSnapshot::new(
                todo_id, "final", 2,
            )))
            .await
            .unwrap();

        assert_eq!(coordinator.queue().store().pending_count(), 2);
    }

    // Second process lifetime: the queue picks the commands back up.
    let store = OperationStore::open(FileBackend::open(&path).unwrap()).unwrap();
    let coordinator = coordinator_over(store);
    assert_eq!(coordinator.queue().store().pending_count(), 2);

    let monitor = ConnectivityMonitor::new(true);
    let _listener = coordinator.watch_connectivity(&monitor);

    wait_until(|| coordinator.queue().store().pending_count() == 0).await;

    let calls = coordinator.queue().remote().calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], RemoteCall::UpdateTodo(t) if t.title == "draft"));
    assert!(matches!(&calls[1], RemoteCall::UpdateTodo(t) if t.title == "final"));
}

#[tokio::test]
async fn going_offline_mid_session_defers_new_mutations() {
    init_tracing();
    let coordinator = memory_coordinator();
    let monitor = ConnectivityMonitor::new(true);
    let _listener = coordinator.watch_connectivity(&monitor);

    wait_until(|| coordinator.queue().is_online()).await;

    let confirmed = coordinator
        .perform_mutation(MutationOperation::DeleteTodo(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(confirmed.is_confirmed());

    monitor.set_online(false);
    wait_until(|| !coordinator.queue().is_online()).await;

    let deferred = coordinator
        .perform_mutation(MutationOperation::DeleteTodo(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(!deferred.is_confirmed());
    assert_eq!(coordinator.queue().store().pending_count(), 1);
}
