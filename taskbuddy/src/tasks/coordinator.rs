//! Optimistic mutation coordinator.
//!
//! [`TaskCoordinator`] is the single source of truth for the application's
//! view of tasks. Every mutation applies its local effect synchronously,
//! before the remote call resolves, and records a targeted undo. A failed
//! remote call rolls back exactly that mutation's effect; a successful one
//! needs no correction because the next subscription snapshot supersedes
//! local state with ground truth.
//!
//! Mutation entry points never return errors: a failed mutation is
//! observable only as its optimistic change reverting.
//!
//! # Rollback and concurrency
//!
//! Undo records are targeted, not whole-list snapshots, so concurrent
//! in-flight mutations compose: rolling one back cannot discard another's
//! optimistic effect. `Restore` skips tasks that have since disappeared
//! and `Reinsert` skips tasks that already exist, so a rollback cannot
//! resurrect a remotely deleted task or duplicate an existing one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use taskbuddy_proto::task::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, UserId};

use crate::store::{CancelToken, DocumentStore};

use super::repository::TaskRepository;
use super::subscription::TaskChannel;

/// Targeted inverse of one optimistic transformation.
enum Undo {
    /// Remove the provisional tasks a create inserted.
    Remove(Vec<TaskId>),
    /// Restore the prior versions of patched tasks, where still present.
    Restore(Vec<Task>),
    /// Put back removed tasks, where not already present.
    Reinsert(Vec<Task>),
}

/// A running per-user sync session.
struct Session {
    user: UserId,
    /// Cancels the subscription feed.
    cancel: CancelToken,
    /// The reconciliation loop consuming that feed.
    recon: JoinHandle<()>,
}

/// Owns the local task collection and merges optimistic edits with
/// confirmed remote state.
///
/// One coordinator per signed-in session. Independent coordinators for
/// the same user (other tabs, other devices) hold their own local copies
/// and converge only through the subscription feed.
pub struct TaskCoordinator<S: DocumentStore + 'static> {
    repo: TaskRepository<S>,
    store: Arc<S>,
    tasks: Arc<Mutex<Vec<Task>>>,
    session: Mutex<Option<Session>>,
}

impl<S: DocumentStore + 'static> TaskCoordinator<S> {
    /// Creates a coordinator with no active session.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            repo: TaskRepository::new(Arc::clone(&store)),
            store,
            tasks: Arc::new(Mutex::new(Vec::new())),
            session: Mutex::new(None),
        }
    }

    /// Returns the current local task collection.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    /// Returns the user of the active session, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.session.lock().as_ref().map(|s| s.user.clone())
    }

    /// Starts a sync session for `user`, ending any previous one.
    ///
    /// Runs, in order: the legacy-status repair sweep (its completion
    /// gates everything after it; a failure is logged and the session
    /// continues degraded), an initial fetch for immediate population,
    /// and the subscription feed with its reconciliation loop.
    pub async fn start_session(&self, user: &UserId) {
        self.end_session().await;
        tracing::info!(user = %user, "starting task session");

        if let Err(err) = self.repo.repair_statuses(user).await {
            tracing::error!(user = %user, error = %err, "status repair failed");
        }

        match self.repo.list(user).await {
            Ok(tasks) => *self.tasks.lock() = tasks,
            Err(err) => tracing::error!(user = %user, error = %err, "initial task fetch failed"),
        }

        let mut channel = TaskChannel::open(self.store.as_ref(), user);
        let cancel = channel.cancel_token();
        let tasks = Arc::clone(&self.tasks);
        let recon = tokio::spawn(async move {
            while let Some(snapshot) = channel.next_snapshot().await {
                *tasks.lock() = snapshot;
            }
            tracing::debug!("task snapshot feed ended");
        });

        *self.session.lock() = Some(Session {
            user: user.clone(),
            cancel,
            recon,
        });
    }

    /// Ends the active session: cancels the subscription, stops the
    /// reconciliation loop, and clears local state. No-op without a
    /// session.
    pub async fn end_session(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        tracing::info!(user = %session.user, "ending task session");
        session.cancel.cancel();
        session.recon.abort();
        let _ = session.recon.await;
        self.tasks.lock().clear();
    }

    /// Re-fetches the task list for the active session.
    pub async fn refresh(&self) {
        let Some(user) = self.current_user() else {
            return;
        };
        match self.repo.list(&user).await {
            Ok(tasks) => *self.tasks.lock() = tasks,
            Err(err) => tracing::error!(error = %err, "task refresh failed"),
        }
    }

    /// Watches an identity feed and binds the session lifecycle to it:
    /// a signed-in user starts a session, "no user" ends it.
    pub fn watch_identity(
        self: Arc<Self>,
        mut auth: watch::Receiver<Option<UserId>>,
    ) -> JoinHandle<()> {
        let coordinator = self;
        tokio::spawn(async move {
            loop {
                let user = auth.borrow_and_update().clone();
                match user {
                    Some(user) => coordinator.start_session(&user).await,
                    None => coordinator.end_session().await,
                }
                if auth.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Creates a task, inserting a provisional entry immediately.
    pub async fn create(&self, draft: TaskDraft) {
        let Some(user) = self.current_user() else {
            tracing::warn!("create ignored: no active session");
            return;
        };

        let now = Utc::now();
        let provisional = Task {
            id: TaskId::new(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: draft.status,
            category: draft.category,
            due_date: draft.due_date,
            created_at: now,
            updated_at: now,
            user_id: user.clone(),
            attachments: Vec::new(),
        };

        let undo = {
            let mut tasks = self.tasks.lock();
            tasks.insert(0, provisional.clone());
            Undo::Remove(vec![provisional.id.clone()])
        };

        match self.repo.create(&draft, &user).await {
            Ok(task) => tracing::debug!(task = %task.id, "create confirmed"),
            Err(err) => {
                tracing::error!(error = %err, "create failed, rolling back");
                self.rollback(undo);
            }
        }
    }

    /// Applies a partial update, patching the local task immediately.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) {
        let now = Utc::now();
        let undo = {
            let mut tasks = self.tasks.lock();
            match tasks.iter_mut().find(|t| t.id == *id) {
                Some(task) => {
                    let prior = task.clone();
                    apply_patch(task, &patch, now);
                    Undo::Restore(vec![prior])
                }
                // Not present locally; the remote call decides.
                None => Undo::Restore(Vec::new()),
            }
        };

        match self.repo.update(id, &patch).await {
            Ok(task) => tracing::debug!(task = %task.id, "update confirmed"),
            Err(err) => {
                tracing::error!(task = %id, error = %err, "update failed, rolling back");
                self.rollback(undo);
            }
        }
    }

    /// Deletes a task, removing it locally immediately.
    pub async fn delete(&self, id: &TaskId) {
        self.delete_many(std::slice::from_ref(id)).await;
    }

    /// Deletes several tasks, removing them locally immediately.
    ///
    /// Ids that no longer exist remotely are skipped without error.
    pub async fn delete_many(&self, ids: &[TaskId]) {
        let undo = {
            let mut tasks = self.tasks.lock();
            let mut removed = Vec::new();
            tasks.retain(|task| {
                if ids.contains(&task.id) {
                    removed.push(task.clone());
                    false
                } else {
                    true
                }
            });
            Undo::Reinsert(removed)
        };

        match self.repo.delete_many(ids).await {
            Ok(()) => tracing::debug!(count = ids.len(), "delete confirmed"),
            Err(err) => {
                tracing::error!(error = %err, "delete failed, rolling back");
                self.rollback(undo);
            }
        }
    }

    /// Moves a task to a new status lane, patching locally immediately.
    pub async fn set_status(&self, id: &TaskId, status: TaskStatus) {
        let undo = self.apply_status_locally(std::slice::from_ref(id), status);

        match self.repo.set_status(id, status).await {
            Ok(task) => tracing::debug!(task = %task.id, status = %status, "status confirmed"),
            Err(err) => {
                tracing::error!(task = %id, error = %err, "status update failed, rolling back");
                self.rollback(undo);
            }
        }
    }

    /// Moves several tasks to a new status lane, patching locally
    /// immediately. Missing ids are skipped without error.
    pub async fn set_status_many(&self, ids: &[TaskId], status: TaskStatus) {
        let undo = self.apply_status_locally(ids, status);

        match self.repo.set_status_many(ids, status).await {
            Ok(()) => tracing::debug!(count = ids.len(), status = %status, "batch status confirmed"),
            Err(err) => {
                tracing::error!(error = %err, "batch status update failed, rolling back");
                self.rollback(undo);
            }
        }
    }

    fn apply_status_locally(&self, ids: &[TaskId], status: TaskStatus) -> Undo {
        let now = Utc::now();
        let mut tasks = self.tasks.lock();
        let mut priors = Vec::new();
        for task in tasks.iter_mut().filter(|t| ids.contains(&t.id)) {
            priors.push(task.clone());
            task.status = status;
            task.updated_at = now;
        }
        Undo::Restore(priors)
    }

    fn rollback(&self, undo: Undo) {
        let mut tasks = self.tasks.lock();
        match undo {
            Undo::Remove(ids) => tasks.retain(|t| !ids.contains(&t.id)),
            Undo::Restore(priors) => {
                for prior in priors {
                    if let Some(slot) = tasks.iter_mut().find(|t| t.id == prior.id) {
                        *slot = prior;
                    }
                }
            }
            Undo::Reinsert(priors) => {
                for prior in priors {
                    if !tasks.iter().any(|t| t.id == prior.id) {
                        tasks.push(prior);
                    }
                }
            }
        }
    }
}

fn apply_patch(task: &mut Task, patch: &TaskPatch, now: DateTime<Utc>) {
    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    if let Some(description) = &patch.description {
        task.description = description.clone();
    }
    if let Some(status) = patch.status {
        task.status = status;
    }
    if let Some(category) = patch.category {
        task.category = category;
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = due_date;
    }
    task.updated_at = now;
}
