// crates/stratus-core/src/core/time.rs
// ============================================================================
// Module: Stratus Time Model
// Description: Millisecond timestamps plus the wire renderings clients expect.
// Purpose: Keep creation times and response dates in one representation.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Resources record `created_at` as unix milliseconds. Responses need the
//! same instant as RFC 3339, as epoch seconds (JSON protocols), or as an
//! RFC 7231 HTTP date (the `Date` header).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wraps an explicit unix millisecond value.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Reads the wall clock. Clocks before the epoch collapse to zero.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_unix_millis(&self) -> i64 {
        self.0
    }

    /// Returns fractional epoch seconds, the form JSON control planes emit.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Millisecond epochs fit in f64 mantissa.")]
    pub fn as_epoch_seconds(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Renders the timestamp as RFC 3339 in UTC.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.to_offset_date_time()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
    }

    /// Renders the timestamp as an RFC 7231 HTTP date.
    #[must_use]
    pub fn to_http_date(&self) -> String {
        let format = format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        );
        self.to_offset_date_time()
            .format(&format)
            .unwrap_or_else(|_| String::from("Thu, 01 Jan 1970 00:00:00 GMT"))
    }

    /// Converts to a UTC date-time, clamping out-of-range values to the epoch.
    fn to_offset_date_time(self) -> OffsetDateTime {
        let nanos = i128::from(self.0) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn renders_http_date_in_gmt() {
        let stamp = Timestamp::from_unix_millis(784_111_777_000);
        assert_eq!(stamp.to_http_date(), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn renders_rfc3339() {
        let stamp = Timestamp::from_unix_millis(0);
        assert_eq!(stamp.to_rfc3339(), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn epoch_seconds_keep_fraction() {
        let stamp = Timestamp::from_unix_millis(1_500);
        assert!((stamp.as_epoch_seconds() - 1.5).abs() < f64::EPSILON);
    }
}
