//! Timestamp utilities
//!
//! All persisted timestamps are epoch milliseconds (UTC).

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Stamp for a mutation of a record last stamped at `previous`.
///
/// Always strictly greater than `previous`, even when two mutations land
/// in the same millisecond.
pub fn next_stamp(previous: i64) -> i64 {
    now_millis().max(previous.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        let millis = now_millis();
        // After 2020-01-01 and before 2100-01-01
        assert!(millis > 1_577_836_800_000);
        assert!(millis < 4_102_444_800_000);
    }

    #[test]
    fn test_now_millis_matches_now() {
        let a = now().timestamp_millis();
        let b = now_millis();
        assert!(b >= a);
        assert!(b - a < 1_000);
    }

    #[test]
    fn test_next_stamp_advances_past_previous() {
        let current = now_millis();
        assert!(next_stamp(current) > current);
    }

    #[test]
    fn test_next_stamp_from_future_previous() {
        // A record stamped ahead of the local clock still moves forward
        let future = now_millis() + 60_000;
        assert_eq!(next_stamp(future), future + 1);
    }

    #[test]
    fn test_next_stamp_from_old_previous_uses_clock() {
        let stamp = next_stamp(0);
        assert!(stamp > 1_577_836_800_000);
    }

    #[test]
    fn test_next_stamp_saturates() {
        assert_eq!(next_stamp(i64::MAX), i64::MAX);
    }
}
