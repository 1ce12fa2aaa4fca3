//! Conversion between the store's 2001-based nanosecond clock and UTC

use chrono::{DateTime, Utc};

/// Seconds between 1970-01-01 and 2001-01-01
pub const APPLE_EPOCH_OFFSET: i64 = 978_307_200;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Stored nanoseconds to UTC. A missing value maps to the reference date itself.
pub fn apple_date(value: Option<i64>) -> DateTime<Utc> {
    let nanos = value.unwrap_or(0);
    let secs = nanos.div_euclid(NANOS_PER_SECOND) + APPLE_EPOCH_OFFSET;
    let subsec = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
    DateTime::from_timestamp(secs, subsec).unwrap_or_default()
}

/// UTC to stored nanoseconds
pub fn apple_epoch(date: &DateTime<Utc>) -> i64 {
    (date.timestamp() - APPLE_EPOCH_OFFSET)
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(i64::from(date.timestamp_subsec_nanos()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_reference_date() {
        assert_eq!(apple_date(Some(0)).to_rfc3339(), "2001-01-01T00:00:00+00:00");
        assert_eq!(apple_date(None), apple_date(Some(0)));
    }

    #[test]
    fn test_round_trip() {
        let date = DateTime::from_timestamp(1_000, 0).unwrap();
        let stored = apple_epoch(&date);
        assert_eq!(stored, (1_000 - APPLE_EPOCH_OFFSET) * NANOS_PER_SECOND);
        assert_eq!(apple_date(Some(stored)), date);
    }

    #[test]
    fn test_subsecond_precision() {
        let date = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(apple_date(Some(apple_epoch(&date))), date);
    }
}
