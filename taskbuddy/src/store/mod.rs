//! Document store boundary for `TaskBuddy`.
//!
//! Defines the [`DocumentStore`] trait — the primitive set the sync core
//! depends on: query-by-field, get-by-id, add, update, delete, atomic
//! batch commit, and snapshot subscription. Concrete backends:
//! - [`memory::MemoryStore`] — in-process store for tests and local use
//!
//! The production cloud backend lives outside this crate; anything that
//! satisfies this trait can stand behind the repository.

pub mod memory;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use taskbuddy_proto::task::TaskId;
use taskbuddy_proto::wire::{Document, WireValue};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The targeted document does not exist.
    #[error("document not found: {0}")]
    NotFound(TaskId),
}

/// A single write in an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Merge `patch` into the document with the given id.
    Update {
        /// Target document.
        id: TaskId,
        /// Fields to overwrite.
        patch: Document,
    },
    /// Delete the document with the given id.
    Delete {
        /// Target document.
        id: TaskId,
    },
}

/// One full snapshot of the documents matching a subscription.
///
/// Always the complete recomputed matching set, never a delta.
pub type DocSnapshot = Vec<(TaskId, Document)>;

/// Cancellation flag for a subscription.
///
/// Cloneable; cancelling twice is a no-op. Once cancelled, the store
/// stops delivering snapshots and drops the subscriber at the next
/// commit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the subscription as cancelled. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A live snapshot subscription handed out by a store.
///
/// Holds the receiving end of the snapshot feed plus the cancellation
/// token. Dropping the subscription also ends delivery, but callers are
/// expected to [`cancel`](Self::cancel) explicitly at teardown.
#[derive(Debug)]
pub struct DocSubscription {
    rx: mpsc::UnboundedReceiver<DocSnapshot>,
    token: CancelToken,
}

impl DocSubscription {
    /// Creates a subscription from a snapshot receiver and its token.
    ///
    /// For store implementations.
    #[must_use]
    pub fn new(rx: mpsc::UnboundedReceiver<DocSnapshot>, token: CancelToken) -> Self {
        Self { rx, token }
    }

    /// Creates a subscription that never yields.
    ///
    /// Used where a subscription failed to open but the failure is
    /// absorbed rather than surfaced.
    #[must_use]
    pub fn closed() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(tx);
        let token = CancelToken::new();
        token.cancel();
        Self { rx, token }
    }

    /// Receives the next snapshot, or `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<DocSnapshot> {
        self.rx.recv().await
    }

    /// Cancels delivery. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns a clone of the cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }
}

/// Async document-store primitives the sync core is written against.
///
/// # Server timestamps
///
/// Any [`WireValue::ServerTimestamp`] sentinel in a written document is
/// resolved to the store's clock at commit. All writes in one atomic
/// commit share one timestamp, and the store clock is strictly
/// increasing across commits.
///
/// [`WireValue::ServerTimestamp`]: taskbuddy_proto::wire::WireValue::ServerTimestamp
pub trait DocumentStore: Send + Sync {
    /// Returns up to `limit` documents whose `field` equals `value`.
    ///
    /// No ordering guarantee; callers must not assume one. Documents
    /// beyond `limit` are silently invisible.
    fn query_eq(
        &self,
        field: &str,
        value: &WireValue,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<DocSnapshot, StoreError>> + Send;

    /// Reads a single document; absence is `None`, not an error.
    fn get(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Writes a new document; the store assigns and returns its id.
    fn add(
        &self,
        doc: Document,
    ) -> impl std::future::Future<Output = Result<TaskId, StoreError>> + Send;

    /// Merge-updates an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document is gone.
    fn update(
        &self,
        id: &TaskId,
        patch: Document,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a document. Deleting a missing id is a no-op.
    fn delete(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Commits a batch atomically: every op applies, or none do.
    fn commit_batch(
        &self,
        ops: Vec<BatchOp>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Opens a snapshot feed over the documents whose `field` equals
    /// `value`, capped at `limit` documents per snapshot.
    ///
    /// On every committed change affecting a matching document the
    /// subscriber receives the complete recomputed matching set, in
    /// commit order.
    fn subscribe_eq(
        &self,
        field: &str,
        value: &WireValue,
        limit: usize,
    ) -> Result<DocSubscription, StoreError>;
}
