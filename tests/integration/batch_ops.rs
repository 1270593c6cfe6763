//! Integration tests for batch delete and batch status update.
//!
//! Verifies the best-effort-per-id / atomic-per-commit contract: missing
//! ids are silently skipped, the surviving ops commit as one unit, and a
//! failed commit applies nothing.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use taskbuddy::store::memory::MemoryStore;
use taskbuddy::tasks::{TaskError, TaskRepository};
use taskbuddy_proto::task::{TaskDraft, TaskId, TaskStatus, UserId};

fn user() -> UserId {
    UserId::new("u1")
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        ..TaskDraft::default()
    }
}

fn make_repo() -> (Arc<MemoryStore>, TaskRepository<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let repo = TaskRepository::new(Arc::clone(&store));
    (store, repo)
}

#[tokio::test]
async fn batch_delete_removes_existing_and_skips_missing() {
    let (_store, repo) = make_repo();
    let a = repo.create(&draft("a"), &user()).await.expect("create");
    let b = repo.create(&draft("b"), &user()).await.expect("create");
    let keep = repo.create(&draft("keep"), &user()).await.expect("create");

    // Two of the four targeted ids exist.
    repo.delete_many(&[a.id.clone(), TaskId::new(), b.id.clone(), TaskId::new()])
        .await
        .expect("batch delete");

    let remaining = repo.list(&user()).await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, keep.id);
}

#[tokio::test]
async fn batch_delete_of_only_missing_ids_is_a_no_op() {
    let (store, repo) = make_repo();
    repo.create(&draft("untouched"), &user())
        .await
        .expect("create");
    let writes = store.write_count();

    repo.delete_many(&[TaskId::new(), TaskId::new()])
        .await
        .expect("batch delete");

    assert_eq!(store.write_count(), writes);
    assert_eq!(repo.list(&user()).await.expect("list").len(), 1);
}

#[tokio::test]
async fn failed_batch_delete_applies_no_deletes() {
    let (store, repo) = make_repo();
    let a = repo.create(&draft("a"), &user()).await.expect("create");
    let b = repo.create(&draft("b"), &user()).await.expect("create");

    // The existence checks pass, then the store dies before the commit.
    store.set_fail_commits(true);
    let err = repo
        .delete_many(&[a.id.clone(), b.id.clone()])
        .await
        .expect_err("commit should fail");
    assert!(matches!(err, TaskError::Remote(_)));
    store.set_fail_commits(false);

    assert_eq!(repo.list(&user()).await.expect("list").len(), 2);
}

#[tokio::test]
async fn batch_status_update_moves_all_existing_tasks() {
    let (_store, repo) = make_repo();
    let a = repo.create(&draft("a"), &user()).await.expect("create");
    let b = repo.create(&draft("b"), &user()).await.expect("create");
    let other = repo.create(&draft("other"), &user()).await.expect("create");

    repo.set_status_many(
        &[a.id.clone(), TaskId::new(), b.id.clone()],
        TaskStatus::Completed,
    )
    .await
    .expect("batch status");

    assert_eq!(
        repo.get(&a.id).await.expect("get a").status,
        TaskStatus::Completed
    );
    assert_eq!(
        repo.get(&b.id).await.expect("get b").status,
        TaskStatus::Completed
    );
    assert_eq!(
        repo.get(&other.id).await.expect("get other").status,
        TaskStatus::Todo
    );
}

#[tokio::test]
async fn batch_status_update_refreshes_updated_at() {
    let (_store, repo) = make_repo();
    let a = repo.create(&draft("a"), &user()).await.expect("create");
    let before = repo.get(&a.id).await.expect("get");

    repo.set_status_many(&[a.id.clone()], TaskStatus::InProgress)
        .await
        .expect("batch status");

    let after = repo.get(&a.id).await.expect("get");
    assert_eq!(after.status, TaskStatus::InProgress);
    assert!(after.updated_at > before.updated_at);
}
