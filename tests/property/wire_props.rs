//! Property-based tests for the wire contract.
//!
//! Uses proptest to verify:
//! 1. Status/category decoding is total: any string maps into the closed
//!    enum, and everything outside the valid set coerces to the default.
//! 2. A wire string survives decode → encode exactly when it is valid.
//! 3. Wire timestamps round-trip through the domain instant type for the
//!    representable range.

use proptest::prelude::*;

use taskbuddy_proto::task::{TaskCategory, TaskStatus};
use taskbuddy_proto::wire::WireTimestamp;

/// Millis range comfortably inside what a `DateTime<Utc>` can represent
/// (roughly ±126,000 years around the epoch).
const REPRESENTABLE_MILLIS: std::ops::Range<i64> = -4_000_000_000_000_000..4_000_000_000_000_000;

proptest! {
    #[test]
    fn status_decode_is_total(s in "\\PC*") {
        let status = TaskStatus::from_wire(&s);
        prop_assert!(matches!(
            status,
            TaskStatus::Todo | TaskStatus::InProgress | TaskStatus::Completed
        ));
    }

    #[test]
    fn invalid_status_coerces_to_todo(s in "\\PC*") {
        prop_assume!(!TaskStatus::is_valid_wire(&s));
        prop_assert_eq!(TaskStatus::from_wire(&s), TaskStatus::Todo);
    }

    #[test]
    fn status_round_trips_iff_valid(s in "\\PC*") {
        let round_tripped = TaskStatus::from_wire(&s).as_wire_str();
        prop_assert_eq!(round_tripped == s, TaskStatus::is_valid_wire(&s));
    }

    #[test]
    fn category_decode_is_total(s in "\\PC*") {
        let category = TaskCategory::from_wire(&s);
        prop_assert!(matches!(category, TaskCategory::Work | TaskCategory::Personal));
        if s != "personal" {
            prop_assert_eq!(category, TaskCategory::Work);
        }
    }

    #[test]
    fn wire_timestamp_round_trips_in_range(millis in REPRESENTABLE_MILLIS) {
        let ts = WireTimestamp::from_millis(millis);
        let dt = ts.to_datetime();
        prop_assert!(dt.is_some());
        if let Some(dt) = dt {
            prop_assert_eq!(WireTimestamp::from_datetime(dt), ts);
        }
    }

    #[test]
    fn wire_timestamp_never_panics(millis in any::<i64>()) {
        // Out-of-range values are malformed, not fatal.
        let _ = WireTimestamp::from_millis(millis).to_datetime();
    }
}
