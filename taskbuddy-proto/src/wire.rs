//! Wire document model for the task collection.
//!
//! Documents are flat maps of field name to [`WireValue`]. This is the
//! shape the document-store boundary speaks: loosely typed, tolerant of
//! absent or malformed fields. The adapter layer is responsible for
//! mapping documents to the strongly typed domain [`Task`] shape and back.
//!
//! [`Task`]: crate::task::Task

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire field names of the persisted task schema.
pub mod fields {
    /// Task title (string).
    pub const TITLE: &str = "title";
    /// Task description (string).
    pub const DESCRIPTION: &str = "description";
    /// Status lane (string).
    pub const STATUS: &str = "status";
    /// Task category (string).
    pub const CATEGORY: &str = "category";
    /// Due instant (timestamp or null).
    pub const DUE_DATE: &str = "dueDate";
    /// Creation instant (timestamp).
    pub const CREATED_AT: &str = "createdAt";
    /// Last-mutation instant (timestamp).
    pub const UPDATED_AT: &str = "updatedAt";
    /// Owning user (string).
    pub const USER_ID: &str = "userId";
    /// Attachment references (string array).
    pub const ATTACHMENTS: &str = "attachments";
}

/// Store-native timestamp with millisecond precision.
///
/// Conversion to a domain instant is fallible: a stored value outside the
/// representable range is treated as malformed by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireTimestamp(i64);

impl WireTimestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the raw milliseconds since the Unix epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Converts a domain instant to a wire timestamp (truncated to millis).
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    /// Converts to a domain instant, or `None` if the value is out of range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl std::fmt::Display for WireTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A single field value as stored in a task document.
///
/// [`WireValue::ServerTimestamp`] is a write-time sentinel: the store
/// resolves it to its own clock when the write commits. It never appears
/// in a document read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireValue {
    /// Explicit null (distinct from an absent field).
    Null,
    /// UTF-8 string.
    String(String),
    /// Store-native timestamp.
    Timestamp(WireTimestamp),
    /// Ordered array of strings.
    Array(Vec<String>),
    /// Sentinel resolved to the server clock at commit time.
    ServerTimestamp,
}

impl WireValue {
    /// Returns the string value, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the timestamp value, if this is a `Timestamp`.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<WireTimestamp> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Returns the array value, if this is an `Array`.
    #[must_use]
    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// A task document: field name to [`WireValue`] map.
///
/// No field is required at this layer. Defaults for absent fields are the
/// adapter's concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: HashMap<String, WireValue>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a field, or `None` if absent.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&WireValue> {
        self.fields.get(field)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: WireValue) {
        self.fields.insert(field.into(), value);
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: WireValue) -> Self {
        self.set(field, value);
        self
    }

    /// Merges `patch` into this document (update semantics).
    ///
    /// Fields present in the patch overwrite; all other fields survive.
    pub fn merge(&mut self, patch: Self) {
        for (field, value) in patch.fields {
            self.fields.insert(field, value);
        }
    }

    /// Iterates over all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WireValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates mutably over all field values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut WireValue> {
        self.fields.values_mut()
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
