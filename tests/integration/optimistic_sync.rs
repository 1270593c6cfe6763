//! Integration tests for the optimistic mutation cycle.
//!
//! Covers the full coordinator state machine: optimistic apply before
//! remote confirmation, supersession by subscription snapshots, rollback
//! on remote failure, and composition of concurrent in-flight mutations.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskbuddy::store::memory::MemoryStore;
use taskbuddy::tasks::TaskCoordinator;
use taskbuddy_proto::task::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, UserId};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn user() -> UserId {
    UserId::new("u1")
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        ..TaskDraft::default()
    }
}

async fn started() -> (Arc<MemoryStore>, Arc<TaskCoordinator<MemoryStore>>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(TaskCoordinator::new(Arc::clone(&store)));
    coordinator.start_session(&user()).await;
    (store, coordinator)
}

/// Polls until `predicate` holds for the local collection.
async fn wait_for(
    coordinator: &TaskCoordinator<MemoryStore>,
    predicate: impl Fn(&[Task]) -> bool,
) -> Vec<Task> {
    for _ in 0..400 {
        let tasks = coordinator.tasks();
        if predicate(&tasks) {
            return tasks;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached; tasks = {:?}", coordinator.tasks());
}

/// Lets pending snapshots drain so local state is confirmed, not optimistic.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

fn sorted_by_id(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.id.cmp(&b.id));
    tasks
}

// ---------------------------------------------------------------------------
// Optimistic-then-confirm
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_shows_provisional_entry_then_persisted_task() {
    let (store, coordinator) = started().await;

    // A slow remote keeps the create in flight long enough to observe
    // the provisional entry.
    store.set_latency(Some(Duration::from_millis(150)));

    let coord = Arc::clone(&coordinator);
    let pending = tokio::spawn(async move { coord.create(draft("Pack bags")).await });

    // The provisional entry appears before the remote write resolves.
    let provisional = wait_for(&coordinator, |t| t.len() == 1).await;
    assert_eq!(provisional[0].title, "Pack bags");
    assert_eq!(provisional[0].user_id, user());
    let provisional_id = provisional[0].id.clone();

    pending.await.expect("create task");
    store.set_latency(None);

    // Once the snapshot carrying the persisted task lands, the
    // provisional entry is gone and the store-assigned id replaces it.
    let confirmed = wait_for(&coordinator, |t| {
        t.len() == 1 && t[0].id != provisional_id
    })
    .await;
    assert_eq!(confirmed[0].title, "Pack bags");
    assert_eq!(store.doc_count(), 1);
}

// ---------------------------------------------------------------------------
// Optimistic-then-rollback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_update_leaves_collection_exactly_as_before() {
    let (store, coordinator) = started().await;
    coordinator.create(draft("alpha")).await;
    coordinator.create(draft("beta")).await;
    wait_for(&coordinator, |t| t.len() == 2).await;
    settle().await;
    let before = coordinator.tasks();

    store.set_offline(true);
    let target = &before[0].id;
    coordinator
        .update(
            target,
            TaskPatch {
                title: Some("mutated".to_string()),
                description: Some("mutated".to_string()),
                status: Some(TaskStatus::Completed),
                ..TaskPatch::default()
            },
        )
        .await;

    // Byte-for-byte equal, excluding incidental ordering.
    assert_eq!(sorted_by_id(coordinator.tasks()), sorted_by_id(before));
}

#[tokio::test]
async fn failed_delete_many_reinserts_every_removed_task() {
    let (store, coordinator) = started().await;
    coordinator.create(draft("a")).await;
    coordinator.create(draft("b")).await;
    coordinator.create(draft("c")).await;
    wait_for(&coordinator, |t| t.len() == 3).await;
    settle().await;
    let before = coordinator.tasks();

    store.set_offline(true);
    let ids: Vec<TaskId> = before.iter().map(|t| t.id.clone()).collect();
    coordinator.delete_many(&ids).await;

    assert_eq!(sorted_by_id(coordinator.tasks()), sorted_by_id(before));
}

#[tokio::test]
async fn rollback_is_observable_only_as_the_change_reverting() {
    let (store, coordinator) = started().await;
    coordinator.create(draft("stable")).await;
    wait_for(&coordinator, |t| t.len() == 1).await;
    settle().await;
    let id = coordinator.tasks()[0].id.clone();

    // While the failing mutation is in flight, the optimistic state is
    // briefly visible.
    store.set_latency(Some(Duration::from_millis(150)));
    store.set_offline(true);

    let coord = Arc::clone(&coordinator);
    let target = id.clone();
    let pending =
        tokio::spawn(async move { coord.set_status(&target, TaskStatus::Completed).await });

    wait_for(&coordinator, |t| {
        t.len() == 1 && t[0].status == TaskStatus::Completed
    })
    .await;

    pending.await.expect("status task");
    let after = coordinator.tasks();
    assert_eq!(after[0].status, TaskStatus::Todo);
}

// ---------------------------------------------------------------------------
// Concurrent mutations compose
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_rollback_does_not_discard_another_pending_mutation() {
    let (store, coordinator) = started().await;
    coordinator.create(draft("first")).await;
    coordinator.create(draft("second")).await;
    wait_for(&coordinator, |t| t.len() == 2).await;
    settle().await;
    let tasks = sorted_by_id(coordinator.tasks());
    let (a, b) = (tasks[0].clone(), tasks[1].clone());

    store.set_latency(Some(Duration::from_millis(400)));

    // Mutation 1: rename B; its first remote read fires at ~400ms.
    let coord = Arc::clone(&coordinator);
    let b_id = b.id.clone();
    let doomed = tokio::spawn(async move {
        coord
            .update(
                &b_id,
                TaskPatch {
                    title: Some("doomed rename".to_string()),
                    ..TaskPatch::default()
                },
            )
            .await;
    });

    // Knock the store offline before mutation 1's read lands, then start
    // mutation 2 while mutation 1 is still in flight.
    tokio::time::sleep(Duration::from_millis(100)).await;
    store.set_offline(true);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let coord = Arc::clone(&coordinator);
    let a_id = a.id.clone();
    let surviving =
        tokio::spawn(async move { coord.set_status(&a_id, TaskStatus::InProgress).await });

    // Mutation 1 fails and rolls back at ~400ms while mutation 2 stays
    // in flight until ~600ms. Its rollback must restore only B.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mid = sorted_by_id(coordinator.tasks());
    assert_eq!(mid[1].title, b.title, "mutation 1 rolled back");
    assert_eq!(
        mid[0].status,
        TaskStatus::InProgress,
        "mutation 2's optimistic effect survived mutation 1's rollback"
    );

    // Mutation 2 eventually fails too (store still offline) and restores
    // only its own effect.
    surviving.await.expect("status task");
    doomed.await.expect("update task");
    let after = sorted_by_id(coordinator.tasks());
    assert_eq!(after, sorted_by_id(vec![a, b]));
}
