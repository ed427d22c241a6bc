//! Reference-timezone day keys
//!
//! "Today" for usage-limit purposes is computed in a fixed UTC-10 offset
//! (the app's operating region), never in the device's local timezone.
//! Fixed offset means no DST transitions to reason about.

use chrono::{DateTime, FixedOffset, Utc};

/// Fixed reference offset, seconds west of UTC.
const REFERENCE_OFFSET_SECS: i32 = 10 * 3600;

fn reference_offset() -> FixedOffset {
    FixedOffset::west_opt(REFERENCE_OFFSET_SECS).expect("valid fixed offset")
}

/// Calendar-day key (`YYYY-MM-DD`) of an instant in the reference timezone.
pub fn day_key(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&reference_offset())
        .format("%Y-%m-%d")
        .to_string()
}

/// Today's day key in the reference timezone.
pub fn today_key() -> String {
    day_key(Utc::now())
}
