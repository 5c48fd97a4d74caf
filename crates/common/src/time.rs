//! Consensus timestamp utilities.
//!
//! Every ledger event is ordered by a consensus timestamp with nanosecond
//! resolution. The mirror node stores these as `i64` nanoseconds since the
//! Unix epoch, which covers dates up to the year 2262.
//!
//! # Example
//!
//! ```rust
//! use mirror_common::time::{format_instant, parse_instant, to_nanos};
//!
//! let ts = to_nanos(1_567_188_600, 419_072_000).unwrap();
//! let text = format_instant(ts).unwrap();
//! assert_eq!(text, "2019-08-30T18:10:00.419072000Z");
//! assert_eq!(parse_instant(&text).unwrap(), ts);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Returns the current time in nanoseconds since the Unix epoch.
pub fn current_timestamp_nanos() -> i64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX)
}

/// Combines seconds and a nanosecond adjustment into a consensus timestamp.
///
/// Returns an error if the result does not fit in an `i64`.
pub fn to_nanos(seconds: i64, nanos: i32) -> Result<i64> {
    seconds
        .checked_mul(NANOS_PER_SECOND)
        .and_then(|s| s.checked_add(i64::from(nanos)))
        .ok_or_else(|| Error::InvalidTimestamp(format!("{}s {}ns overflows", seconds, nanos)))
}

/// Splits a consensus timestamp back into seconds and nanoseconds.
pub fn split_nanos(timestamp: i64) -> (i64, i32) {
    let seconds = timestamp.div_euclid(NANOS_PER_SECOND);
    let nanos = timestamp.rem_euclid(NANOS_PER_SECOND) as i32;
    (seconds, nanos)
}

/// Converts a consensus timestamp into a UTC date time.
pub fn to_datetime(timestamp: i64) -> Result<DateTime<Utc>> {
    let (seconds, nanos) = split_nanos(timestamp);
    DateTime::from_timestamp(seconds, nanos as u32)
        .ok_or_else(|| Error::InvalidTimestamp(timestamp.to_string()))
}

/// Renders a consensus timestamp as RFC 3339 with nine fractional digits.
pub fn format_instant(timestamp: i64) -> Result<String> {
    let dt = to_datetime(timestamp)?;
    Ok(format!(
        "{}.{:09}Z",
        dt.format("%Y-%m-%dT%H:%M:%S"),
        dt.timestamp_subsec_nanos()
    ))
}

/// Parses an RFC 3339 instant (any fractional precision) into nanoseconds.
pub fn parse_instant(text: &str) -> Result<i64> {
    let dt = DateTime::parse_from_rfc3339(text)
        .map_err(|e| Error::InvalidTimestamp(format!("{}: {}", text, e)))?;
    to_nanos(dt.timestamp(), dt.timestamp_subsec_nanos() as i32)
}

/// Truncates a timestamp down to a multiple of `width` nanoseconds.
///
/// Used to align time partitions and balance file intervals.
pub fn align_down(timestamp: i64, width: i64) -> i64 {
    if width <= 0 {
        return timestamp;
    }
    timestamp - timestamp.rem_euclid(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_timestamp_is_recent() {
        // After 2024-01-01
        assert!(current_timestamp_nanos() > 1_704_067_200 * NANOS_PER_SECOND);
    }

    #[test]
    fn test_split_and_join() {
        let ts = to_nanos(1_600_000_000, 123).unwrap();
        assert_eq!(split_nanos(ts), (1_600_000_000, 123));
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert!(to_nanos(i64::MAX / 2, 0).is_err());
    }

    #[test]
    fn test_parse_instant_with_micro_precision() {
        let ts = parse_instant("2019-08-30T18:10:00.419072Z").unwrap();
        assert_eq!(ts, 1_567_188_600_419_072_000);
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn test_align_down() {
        assert_eq!(align_down(125, 10), 120);
        assert_eq!(align_down(120, 10), 120);
        assert_eq!(align_down(7, 0), 7);
    }
}
