//! Mapping between wire documents and the domain task shape.
//!
//! Pure functions with no side effects. Reads are defensive: absent or
//! malformed fields decode to documented defaults instead of failing, so
//! normalization is total. Writes encode a `None` due date as an explicit
//! wire null rather than omitting the field.

use chrono::{DateTime, Utc};

use taskbuddy_proto::task::{Task, TaskCategory, TaskDraft, TaskId, TaskPatch, TaskStatus, UserId};
use taskbuddy_proto::wire::{Document, WireTimestamp, WireValue, fields};

/// Builds a [`Task`] from a stored document.
///
/// Defaults for absent or mistyped fields: empty strings for
/// title/description, `Todo`/`Work` for status/category, `None` for the
/// due date, empty attachments, and `now` for malformed created/updated
/// timestamps. Attachment ordering is preserved exactly.
#[must_use]
pub fn normalize(id: TaskId, doc: &Document, now: DateTime<Utc>) -> Task {
    let text = |field: &str| {
        doc.get(field)
            .and_then(WireValue::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let instant = |field: &str| {
        doc.get(field)
            .and_then(WireValue::as_timestamp)
            .and_then(WireTimestamp::to_datetime)
            .unwrap_or(now)
    };

    Task {
        id,
        title: text(fields::TITLE),
        description: text(fields::DESCRIPTION),
        status: doc
            .get(fields::STATUS)
            .and_then(WireValue::as_str)
            .map(TaskStatus::from_wire)
            .unwrap_or_default(),
        category: doc
            .get(fields::CATEGORY)
            .and_then(WireValue::as_str)
            .map(TaskCategory::from_wire)
            .unwrap_or_default(),
        // A malformed due date decodes to "no due date", unlike the audit
        // timestamps which fall back to now.
        due_date: doc
            .get(fields::DUE_DATE)
            .and_then(WireValue::as_timestamp)
            .and_then(WireTimestamp::to_datetime),
        created_at: instant(fields::CREATED_AT),
        updated_at: instant(fields::UPDATED_AT),
        user_id: UserId::new(text(fields::USER_ID)),
        attachments: doc
            .get(fields::ATTACHMENTS)
            .and_then(WireValue::as_array)
            .map(<[String]>::to_vec)
            .unwrap_or_default(),
    }
}

/// Encodes a create form as a wire document.
///
/// Covers only the form fields; the repository adds ownership, audit
/// timestamps, and the empty attachment list.
#[must_use]
pub fn denormalize(draft: &TaskDraft) -> Document {
    Document::new()
        .with(fields::TITLE, WireValue::String(draft.title.clone()))
        .with(
            fields::DESCRIPTION,
            WireValue::String(draft.description.clone()),
        )
        .with(
            fields::STATUS,
            WireValue::String(draft.status.as_wire_str().to_string()),
        )
        .with(
            fields::CATEGORY,
            WireValue::String(draft.category.as_wire_str().to_string()),
        )
        .with(fields::DUE_DATE, due_date_value(draft.due_date))
}

/// Encodes the present fields of a partial update as a wire document.
#[must_use]
pub fn patch_document(patch: &TaskPatch) -> Document {
    let mut doc = Document::new();
    if let Some(title) = &patch.title {
        doc.set(fields::TITLE, WireValue::String(title.clone()));
    }
    if let Some(description) = &patch.description {
        doc.set(fields::DESCRIPTION, WireValue::String(description.clone()));
    }
    if let Some(status) = patch.status {
        doc.set(
            fields::STATUS,
            WireValue::String(status.as_wire_str().to_string()),
        );
    }
    if let Some(category) = patch.category {
        doc.set(
            fields::CATEGORY,
            WireValue::String(category.as_wire_str().to_string()),
        );
    }
    if let Some(due_date) = patch.due_date {
        doc.set(fields::DUE_DATE, due_date_value(due_date));
    }
    doc
}

fn due_date_value(due_date: Option<DateTime<Utc>>) -> WireValue {
    due_date.map_or(WireValue::Null, |dt| {
        WireValue::Timestamp(WireTimestamp::from_datetime(dt))
    })
}
