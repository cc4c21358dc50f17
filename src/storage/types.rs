//! Core data types for the telemetry storage engine
//!
//! - `TelemetryPoint`: one persisted (signal, timestamp, value) fact
//! - `SeriesPoint`: the `(timestamp, value)` pair returned by range queries
//! - `TimeRange`: an inclusive time window for queries
//!
//! Instants are UTC and stored with microsecond precision.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A single persisted telemetry measurement
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPoint {
    /// Caller-supplied instant of the sample
    pub timestamp: DateTime<Utc>,
    /// Name of the signal this sample belongs to
    pub signal_name: String,
    /// The measured value (always finite)
    pub value: f64,
    /// Server-assigned instant of persistence
    pub recorded_at: DateTime<Utc>,
}

impl TelemetryPoint {
    pub fn new(
        signal_name: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            signal_name: signal_name.into(),
            value,
            recorded_at,
        }
    }
}

/// One `(timestamp, value)` entry of a signal's history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    #[serde(serialize_with = "serialize_instant")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Per-signal ordered history, keyed by signal name
pub type SignalSeries = BTreeMap<String, Vec<SeriesPoint>>;

/// An inclusive time window `[since, until]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    /// Window ending at `now` and reaching back `lookback`
    pub fn lookback(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            since: now - lookback,
            until: now,
        }
    }

    /// Check whether an instant falls inside the window (both ends inclusive)
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.since && instant <= self.until
    }

    /// A window whose start lies after its end matches nothing
    pub fn is_empty(&self) -> bool {
        self.since > self.until
    }

    pub fn since_micros(&self) -> i64 {
        self.since.timestamp_micros()
    }

    pub fn until_micros(&self) -> i64 {
        self.until.timestamp_micros()
    }
}

/// Render an instant as RFC 3339 with a `Z` suffix and the shortest exact
/// fractional second
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn serialize_instant<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_instant(instant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_instant_whole_seconds() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_instant(&ts), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_format_instant_fractional() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(250);
        assert_eq!(format_instant(&ts), "2024-01-01T00:00:00.250Z");
    }

    #[test]
    fn test_time_range_inclusive_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let range = TimeRange::lookback(now, Duration::hours(1));

        assert!(range.contains(now));
        assert!(range.contains(now - Duration::hours(1)));
        assert!(!range.contains(now - Duration::hours(1) - Duration::microseconds(1)));
        assert!(!range.contains(now + Duration::microseconds(1)));
    }

    #[test]
    fn test_series_point_serialization() {
        let point = SeriesPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            value: 5.5,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, r#"{"timestamp":"2024-01-01T00:00:00Z","value":5.5}"#);
    }
}
