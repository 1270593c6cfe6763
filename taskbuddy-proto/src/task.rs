//! Domain task types for `TaskBuddy`.
//!
//! Defines the [`Task`] entity, its closed [`TaskStatus`] and
//! [`TaskCategory`] enumerations with lenient wire decoding, and the
//! [`TaskDraft`] / [`TaskPatch`] form types used by mutations. Status and
//! category are string-typed on the wire; the decode step here is the only
//! place those strings are interpreted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum task description length in characters.
///
/// Enforced by the editing surface, not by the sync core; this constant
/// documents the contract rather than guarding it.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Unique identifier for a task, based on UUID v7 for time-ordering.
///
/// Assigned by the document store on creation. The coordinator mints a
/// provisional `TaskId` for an optimistic record; the provisional entry is
/// superseded by the first snapshot carrying the persisted task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the owning user of a task.
///
/// Opaque; assigned by the identity provider. Every repository operation
/// is scoped to exactly one `UserId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a user identifier from its string representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this user ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status lane of a task.
///
/// The wire representation is a string; any value outside the valid set
/// decodes to [`TaskStatus::Todo`]. The coercion is silent and lossy: the
/// original invalid value is not preserved anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Task has not been started.
    #[default]
    Todo,
    /// Task is actively being worked on.
    InProgress,
    /// Task has been completed.
    Completed,
}

impl TaskStatus {
    /// Decodes a wire status string, coercing unknown values to `Todo`.
    ///
    /// Total: every input maps to one of the three valid statuses.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "inProgress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Todo,
        }
    }

    /// Returns the wire string for this status.
    #[must_use]
    pub const fn as_wire_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "inProgress",
            Self::Completed => "completed",
        }
    }

    /// Returns `true` if the raw wire string is one of the valid statuses.
    ///
    /// Used by the repair sweep to detect legacy values before the lossy
    /// decode hides them.
    #[must_use]
    pub fn is_valid_wire(s: &str) -> bool {
        matches!(s, "todo" | "inProgress" | "completed")
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

/// Category of a task.
///
/// Unknown or absent wire values decode to [`TaskCategory::Work`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskCategory {
    /// Work-related task.
    #[default]
    Work,
    /// Personal task.
    Personal,
}

impl TaskCategory {
    /// Decodes a wire category string, coercing unknown values to `Work`.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "personal" => Self::Personal,
            _ => Self::Work,
        }
    }

    /// Returns the wire string for this category.
    #[must_use]
    pub const fn as_wire_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Personal => "personal",
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

/// A task as seen by the application.
///
/// The domain shape of one document in the task collection. `created_at`
/// is written once at creation; `updated_at` is refreshed by every
/// mutation. `attachments` is carried for forward extension and never
/// mutated by any operation in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (store-assigned, or provisional while optimistic).
    pub id: TaskId,
    /// Task title.
    pub title: String,
    /// Free-text description (capped by the editing surface).
    pub description: String,
    /// Status lane.
    pub status: TaskStatus,
    /// Task category.
    pub category: TaskCategory,
    /// Optional due instant.
    pub due_date: Option<DateTime<Utc>>,
    /// When the task was created (server clock).
    pub created_at: DateTime<Utc>,
    /// When the task was last mutated (server clock).
    pub updated_at: DateTime<Utc>,
    /// Owning user.
    pub user_id: UserId,
    /// Ordered attachment references, default empty.
    pub attachments: Vec<String>,
}

/// Form fields for creating a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Task title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Initial status lane.
    pub status: TaskStatus,
    /// Task category.
    pub category: TaskCategory,
    /// Optional due instant.
    pub due_date: Option<DateTime<Utc>>,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            status: TaskStatus::Todo,
            category: TaskCategory::Work,
            due_date: None,
        }
    }
}

/// Partial update to a task's form fields.
///
/// `None` leaves a field untouched. The due date is doubly optional so a
/// patch can distinguish "leave unchanged" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title, if changing.
    pub title: Option<String>,
    /// New description, if changing.
    pub description: Option<String>,
    /// New status, if changing.
    pub status: Option<TaskStatus>,
    /// New category, if changing.
    pub category: Option<TaskCategory>,
    /// New due date: `Some(None)` clears it.
    pub due_date: Option<Option<DateTime<Utc>>>,
}
