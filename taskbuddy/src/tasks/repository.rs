//! Remote task repository.
//!
//! [`TaskRepository`] is the single authorized path for querying and
//! mutating the remote task collection. It is a stateless pass-through:
//! it holds no task cache and every call is scoped to one user or one
//! task id. Batch operations are best-effort per id (missing ids are
//! silently skipped) but commit atomically as one write unit.

use std::sync::Arc;

use chrono::Utc;

use taskbuddy_proto::task::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, UserId};
use taskbuddy_proto::wire::{Document, WireValue, fields};

use crate::store::{BatchOp, DocumentStore};

use super::TaskError;
use super::adapter;

/// Hard cap on query results.
///
/// A user with more tasks than this sees the excess silently dropped
/// from list results and subscription snapshots. There is no pagination
/// fallback.
pub const QUERY_LIMIT: usize = 1000;

/// Stateless remote mutation/query path over a [`DocumentStore`].
pub struct TaskRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for TaskRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> TaskRepository<S> {
    /// Creates a repository over the given store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn owner_value(user: &UserId) -> WireValue {
        WireValue::String(user.as_str().to_string())
    }

    /// Lists the user's tasks, capped at [`QUERY_LIMIT`].
    ///
    /// Ordering is store-determined; callers must not assume one.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the store cannot be queried.
    pub async fn list(&self, user: &UserId) -> Result<Vec<Task>, TaskError> {
        let docs = self
            .store
            .query_eq(fields::USER_ID, &Self::owner_value(user), QUERY_LIMIT)
            .await?;
        let now = Utc::now();
        Ok(docs
            .into_iter()
            .map(|(id, doc)| adapter::normalize(id, &doc, now))
            .collect())
    }

    /// Reads a single task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the task does not exist, or
    /// [`TaskError::Remote`] on store failure.
    pub async fn get(&self, id: &TaskId) -> Result<Task, TaskError> {
        let doc = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;
        Ok(adapter::normalize(id.clone(), &doc, Utc::now()))
    }

    /// Creates a task owned by `user`.
    ///
    /// The audit timestamps are written as server-timestamp sentinels;
    /// the returned task carries client-side approximations, which the
    /// next subscription snapshot supersedes with the committed values.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the write fails.
    pub async fn create(&self, draft: &TaskDraft, user: &UserId) -> Result<Task, TaskError> {
        let doc = adapter::denormalize(draft)
            .with(fields::USER_ID, Self::owner_value(user))
            .with(fields::CREATED_AT, WireValue::ServerTimestamp)
            .with(fields::UPDATED_AT, WireValue::ServerTimestamp)
            .with(fields::ATTACHMENTS, WireValue::Array(Vec::new()));

        let id = self.store.add(doc).await?;
        tracing::debug!(task = %id, user = %user, "task created");

        let now = Utc::now();
        Ok(Task {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: draft.status,
            category: draft.category,
            due_date: draft.due_date,
            created_at: now,
            updated_at: now,
            user_id: user.clone(),
            attachments: Vec::new(),
        })
    }

    /// Applies a partial update and returns the task read back from the
    /// store. Always refreshes `updatedAt`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the task no longer exists, or
    /// [`TaskError::Remote`] on store failure.
    pub async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, TaskError> {
        self.require_exists(id).await?;

        let doc = adapter::patch_document(patch)
            .with(fields::UPDATED_AT, WireValue::ServerTimestamp);
        self.store.update(id, doc).await?;
        tracing::debug!(task = %id, "task updated");

        self.get(id).await
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the task no longer exists, or
    /// [`TaskError::Remote`] on store failure.
    pub async fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        self.require_exists(id).await?;
        self.store.delete(id).await?;
        tracing::debug!(task = %id, "task deleted");
        Ok(())
    }

    /// Deletes the given tasks as one atomic batch.
    ///
    /// Ids that no longer exist are silently skipped; the remaining
    /// deletes either all apply or, if the commit itself fails, none do.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the commit fails.
    pub async fn delete_many(&self, ids: &[TaskId]) -> Result<(), TaskError> {
        let mut ops = Vec::new();
        for id in ids {
            if self.store.get(id).await?.is_some() {
                ops.push(BatchOp::Delete { id: id.clone() });
            }
        }
        let deleted = ops.len();
        self.store.commit_batch(ops).await?;
        tracing::debug!(deleted, skipped = ids.len() - deleted, "batch delete committed");
        Ok(())
    }

    /// Moves a task to a new status lane and returns the updated task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the task no longer exists, or
    /// [`TaskError::Remote`] on store failure.
    pub async fn set_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, TaskError> {
        self.update(
            id,
            &TaskPatch {
                status: Some(status),
                ..TaskPatch::default()
            },
        )
        .await
    }

    /// Moves the given tasks to a new status lane as one atomic batch.
    ///
    /// Same skip-and-commit contract as [`delete_many`](Self::delete_many).
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the commit fails.
    pub async fn set_status_many(
        &self,
        ids: &[TaskId],
        status: TaskStatus,
    ) -> Result<(), TaskError> {
        let mut ops = Vec::new();
        for id in ids {
            if self.store.get(id).await?.is_some() {
                ops.push(BatchOp::Update {
                    id: id.clone(),
                    patch: status_patch(status),
                });
            }
        }
        let updated = ops.len();
        self.store.commit_batch(ops).await?;
        tracing::debug!(updated, status = %status, "batch status update committed");
        Ok(())
    }

    /// Repairs legacy status values for a user.
    ///
    /// Scans every document owned by `user` (deliberately uncapped,
    /// unlike [`list`](Self::list)) and batch-rewrites any whose raw
    /// `status` is absent, mistyped, or outside the valid set to `todo`
    /// with a refreshed `updatedAt`. Idempotent: a second consecutive run
    /// finds nothing to rewrite and performs zero writes.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the scan or the commit fails.
    pub async fn repair_statuses(&self, user: &UserId) -> Result<(), TaskError> {
        let docs = self
            .store
            .query_eq(fields::USER_ID, &Self::owner_value(user), usize::MAX)
            .await?;
        let scanned = docs.len();

        let ops: Vec<BatchOp> = docs
            .into_iter()
            .filter(|(_, doc)| {
                !matches!(
                    doc.get(fields::STATUS),
                    Some(WireValue::String(s)) if TaskStatus::is_valid_wire(s)
                )
            })
            .map(|(id, _)| BatchOp::Update {
                id,
                patch: status_patch(TaskStatus::Todo),
            })
            .collect();

        if ops.is_empty() {
            tracing::debug!(user = %user, scanned, "no legacy statuses found");
            return Ok(());
        }

        let repaired = ops.len();
        self.store.commit_batch(ops).await?;
        tracing::info!(user = %user, scanned, repaired, "legacy statuses repaired");
        Ok(())
    }

    async fn require_exists(&self, id: &TaskId) -> Result<(), TaskError> {
        match self.store.get(id).await? {
            Some(_) => Ok(()),
            None => Err(TaskError::NotFound(id.clone())),
        }
    }
}

fn status_patch(status: TaskStatus) -> Document {
    Document::new()
        .with(
            fields::STATUS,
            WireValue::String(status.as_wire_str().to_string()),
        )
        .with(fields::UPDATED_AT, WireValue::ServerTimestamp)
}
