//! Wall-clock readings used by the guards.
//!
//! Guard logic takes `now` as a parameter; only the async drivers read the clock.

use time::OffsetDateTime;

/// Current time as epoch seconds.
#[must_use]
pub fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Current time as epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}
