//! Task synchronization core.
//!
//! The layering mirrors the data path: [`adapter`] maps wire documents to
//! the domain `Task` shape, [`repository`] is the single authorized remote
//! mutation/query path, [`subscription`] wraps the store's push feed, and
//! [`coordinator`] owns the local task collection and applies optimistic
//! mutations with rollback.

pub mod adapter;
pub mod coordinator;
pub mod repository;
pub mod subscription;

pub use coordinator::TaskCoordinator;
pub use repository::TaskRepository;
pub use subscription::TaskChannel;

use taskbuddy_proto::task::TaskId;

use crate::store::StoreError;

/// Errors surfaced by repository operations.
///
/// Invalid status values are never an error anywhere in this crate; they
/// are silently coerced to `todo` at the wire boundary.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The targeted task no longer exists remotely.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The remote store failed or was unreachable.
    #[error("remote store error: {0}")]
    Remote(#[from] StoreError),
}
