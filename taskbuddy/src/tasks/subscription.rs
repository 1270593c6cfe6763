//! Live task subscription channel.
//!
//! [`TaskChannel`] is the explicit handle over the store's snapshot feed
//! for one user: it normalizes each wire snapshot into domain tasks and
//! exposes idempotent cancellation. The raw store subscription is never
//! handed to callers.

use chrono::Utc;

use taskbuddy_proto::task::{Task, UserId};
use taskbuddy_proto::wire::{WireValue, fields};

use crate::store::{CancelToken, DocSubscription, DocumentStore};

use super::adapter;
use super::repository::QUERY_LIMIT;

/// Push feed of the full current task set for one user.
///
/// Every delivered snapshot is the complete recomputed set, in remote
/// commit order. Snapshots are capped at [`QUERY_LIMIT`] tasks, matching
/// list queries.
pub struct TaskChannel {
    sub: DocSubscription,
}

impl TaskChannel {
    /// Opens the feed for `user`.
    ///
    /// A failure to open is logged, not surfaced: the returned channel
    /// simply never yields. There is no reconnect policy.
    pub fn open<S: DocumentStore>(store: &S, user: &UserId) -> Self {
        let owner = WireValue::String(user.as_str().to_string());
        match store.subscribe_eq(fields::USER_ID, &owner, QUERY_LIMIT) {
            Ok(sub) => {
                tracing::debug!(user = %user, "task subscription opened");
                Self { sub }
            }
            Err(err) => {
                tracing::error!(user = %user, error = %err, "failed to open task subscription");
                Self {
                    sub: DocSubscription::closed(),
                }
            }
        }
    }

    /// Receives the next snapshot, or `None` once the feed has ended.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Task>> {
        let docs = self.sub.recv().await?;
        let now = Utc::now();
        Some(
            docs.into_iter()
                .map(|(id, doc)| adapter::normalize(id, &doc, now))
                .collect(),
        )
    }

    /// Stops delivery. Idempotent; must be called at teardown.
    pub fn cancel(&self) {
        self.sub.cancel();
    }

    /// Returns a clone of the cancellation token, so an owner can cancel
    /// the feed after the channel itself has moved into a consumer task.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.sub.cancel_token()
    }
}
