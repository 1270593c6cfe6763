//! In-memory document store for tests and local use.
//!
//! [`MemoryStore`] keeps the full document map behind a synchronous
//! [`parking_lot::RwLock`] (no await point ever holds a lock) and pushes
//! full-snapshot notifications to subscribers under the write lock, so
//! snapshots are delivered in commit order. A subscriber is only notified
//! when its matching set actually changed. Server-timestamp sentinels are
//! resolved against a strictly increasing commit clock: two commits never
//! share a timestamp, and all writes within one atomic commit share the
//! same one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use taskbuddy_proto::task::TaskId;
use taskbuddy_proto::wire::{Document, WireTimestamp, WireValue};

use super::{BatchOp, CancelToken, DocSnapshot, DocSubscription, DocumentStore, StoreError};

/// One registered snapshot listener.
struct Subscriber {
    field: String,
    value: WireValue,
    limit: usize,
    tx: mpsc::UnboundedSender<DocSnapshot>,
    token: CancelToken,
    /// Matching set as of the last delivery (or registration).
    last: DocSnapshot,
}

/// In-process [`DocumentStore`] backend.
///
/// Shared across clients via [`std::sync::Arc`]; independent coordinators
/// holding the same store converge through its subscription feed. The
/// [`set_offline`](Self::set_offline) toggle makes every primitive fail
/// with [`StoreError::Unavailable`], which exercises rollback paths.
pub struct MemoryStore {
    docs: RwLock<HashMap<TaskId, Document>>,
    subs: Mutex<Vec<Subscriber>>,
    /// Last commit timestamp handed out, in millis.
    clock: Mutex<i64>,
    offline: AtomicBool,
    /// Fails only batch commits, leaving reads and single writes alive.
    fail_commits: AtomicBool,
    /// Artificial per-operation delay, to widen in-flight windows in tests.
    latency: Mutex<Option<std::time::Duration>>,
    /// Count of write ops actually applied (repair idempotence checks).
    writes: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            subs: Mutex::new(Vec::new()),
            clock: Mutex::new(0),
            offline: AtomicBool::new(false),
            fail_commits: AtomicBool::new(false),
            latency: Mutex::new(None),
            writes: AtomicU64::new(0),
        }
    }

    /// Adds an artificial delay before every async primitive.
    ///
    /// Emulates a remote round-trip so tests can observe optimistic
    /// state while a mutation is in flight.
    pub fn set_latency(&self, latency: Option<std::time::Duration>) {
        *self.latency.lock() = latency;
    }

    async fn pause(&self) {
        let delay = *self.latency.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Simulates loss (or restoration) of store connectivity.
    ///
    /// While offline, every primitive fails with
    /// [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Makes only [`commit_batch`](DocumentStore::commit_batch) fail,
    /// after any per-id existence checks have already succeeded.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::Release);
    }

    /// Number of write operations applied since creation.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Number of documents currently stored.
    #[must_use]
    pub fn doc_count(&self) -> usize {
        self.docs.read().len()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }

    /// Hands out the next commit timestamp, strictly greater than any
    /// previous one even when the wall clock has not advanced.
    fn next_commit_ts(&self) -> WireTimestamp {
        let mut last = self.clock.lock();
        let now = WireTimestamp::now().as_millis();
        let ts = now.max(*last + 1);
        *last = ts;
        WireTimestamp::from_millis(ts)
    }

    fn resolve_sentinels(doc: &mut Document, ts: WireTimestamp) {
        for value in doc.values_mut() {
            if matches!(value, WireValue::ServerTimestamp) {
                *value = WireValue::Timestamp(ts);
            }
        }
    }

    fn matching(
        docs: &HashMap<TaskId, Document>,
        field: &str,
        value: &WireValue,
        limit: usize,
    ) -> DocSnapshot {
        let mut matched: DocSnapshot = docs
            .iter()
            .filter(|(_, doc)| doc.get(field) == Some(value))
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();
        matched.sort_by(|(a, _), (b, _)| a.cmp(b));
        matched.truncate(limit);
        matched
    }

    /// Recomputes each subscriber's matching set and delivers it when it
    /// changed, pruning cancelled or dropped subscribers. Called with the
    /// docs write lock held so deliveries follow commit order.
    fn notify(&self, docs: &HashMap<TaskId, Document>) {
        let mut subs = self.subs.lock();
        subs.retain_mut(|sub| {
            if sub.token.is_cancelled() {
                return false;
            }
            let snapshot = Self::matching(docs, &sub.field, &sub.value, sub.limit);
            if snapshot == sub.last {
                return true;
            }
            if sub.tx.send(snapshot.clone()).is_err() {
                return false;
            }
            sub.last = snapshot;
            true
        });
    }
}

impl DocumentStore for MemoryStore {
    async fn query_eq(
        &self,
        field: &str,
        value: &WireValue,
        limit: usize,
    ) -> Result<DocSnapshot, StoreError> {
        self.pause().await;
        self.check_online()?;
        let docs = self.docs.read();
        Ok(Self::matching(&docs, field, value, limit))
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Document>, StoreError> {
        self.pause().await;
        self.check_online()?;
        Ok(self.docs.read().get(id).cloned())
    }

    async fn add(&self, mut doc: Document) -> Result<TaskId, StoreError> {
        self.pause().await;
        self.check_online()?;
        let ts = self.next_commit_ts();
        Self::resolve_sentinels(&mut doc, ts);
        let id = TaskId::new();

        let mut docs = self.docs.write();
        docs.insert(id.clone(), doc);
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.notify(&docs);
        Ok(id)
    }

    async fn update(&self, id: &TaskId, mut patch: Document) -> Result<(), StoreError> {
        self.pause().await;
        self.check_online()?;
        let ts = self.next_commit_ts();
        Self::resolve_sentinels(&mut patch, ts);

        let mut docs = self.docs.write();
        let Some(doc) = docs.get_mut(id) else {
            return Err(StoreError::NotFound(id.clone()));
        };
        doc.merge(patch);
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.notify(&docs);
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        self.pause().await;
        self.check_online()?;
        let mut docs = self.docs.write();
        if docs.remove(id).is_some() {
            self.writes.fetch_add(1, Ordering::AcqRel);
            self.notify(&docs);
        }
        Ok(())
    }

    async fn commit_batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        self.pause().await;
        self.check_online()?;
        if self.fail_commits.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("batch commit failed".to_string()));
        }
        let ts = self.next_commit_ts();

        let mut docs = self.docs.write();

        // Validate before applying anything: a failed commit applies nothing.
        for op in &ops {
            if let BatchOp::Update { id, .. } = op
                && !docs.contains_key(id)
            {
                return Err(StoreError::NotFound(id.clone()));
            }
        }

        let mut applied = 0u64;
        for op in ops {
            match op {
                BatchOp::Update { id, mut patch } => {
                    Self::resolve_sentinels(&mut patch, ts);
                    if let Some(doc) = docs.get_mut(&id) {
                        doc.merge(patch);
                        applied += 1;
                    }
                }
                BatchOp::Delete { id } => {
                    if docs.remove(&id).is_some() {
                        applied += 1;
                    }
                }
            }
        }

        if applied > 0 {
            self.writes.fetch_add(applied, Ordering::AcqRel);
            self.notify(&docs);
        }
        Ok(())
    }

    fn subscribe_eq(
        &self,
        field: &str,
        value: &WireValue,
        limit: usize,
    ) -> Result<DocSubscription, StoreError> {
        self.check_online()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancelToken::new();
        let last = Self::matching(&self.docs.read(), field, value, limit);
        self.subs.lock().push(Subscriber {
            field: field.to_string(),
            value: value.clone(),
            limit,
            tx,
            token: token.clone(),
            last,
        });
        Ok(DocSubscription::new(rx, token))
    }
}
