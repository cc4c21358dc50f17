//! Signal batches
//!
//! A batch is one producer sample: a shared timestamp plus a value per
//! signal. Construction validates everything up front, so a `SignalBatch`
//! in hand is always safe to persist.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::storage::TelemetryPoint;

/// Longest accepted signal name, in characters
pub const MAX_SIGNAL_NAME_LEN: usize = 100;

/// Naive date-time layouts accepted when a timestamp carries no offset
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Reasons a batch is rejected before anything is written
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("timestamp is required")]
    MissingTimestamp,

    #[error("timestamp '{0}' is not a valid ISO-8601 date-time")]
    InvalidTimestamp(String),

    #[error("signals must contain at least one entry")]
    EmptySignals,

    #[error("signal name cannot be empty")]
    EmptySignalName,

    #[error("signal name '{prefix}...' exceeds maximum length of {max} characters")]
    SignalNameTooLong { prefix: String, max: usize },

    #[error("value for signal '{0}' is not a number")]
    NonNumericValue(String),

    #[error("value for signal '{0}' must be a finite number")]
    NonFiniteValue(String),
}

/// A validated ingestion batch
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBatch {
    timestamp: DateTime<Utc>,
    signals: BTreeMap<String, f64>,
}

impl SignalBatch {
    /// Build a batch from already-typed parts
    ///
    /// The timestamp is truncated to whole microseconds, the resolution the
    /// store keeps, so live updates and history report the same instant.
    pub fn new(
        timestamp: DateTime<Utc>,
        signals: BTreeMap<String, f64>,
    ) -> Result<Self, ValidationError> {
        if signals.is_empty() {
            return Err(ValidationError::EmptySignals);
        }

        for (name, value) in &signals {
            validate_signal_name(name)?;
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteValue(name.clone()));
            }
        }

        Ok(Self {
            timestamp: timestamp.trunc_subsecs(6),
            signals,
        })
    }

    /// Build a batch from the loosely typed wire fields
    pub fn parse(
        timestamp: Option<&str>,
        signals: Option<&Map<String, Value>>,
    ) -> Result<Self, ValidationError> {
        let timestamp = parse_timestamp(timestamp.ok_or(ValidationError::MissingTimestamp)?)?;

        let raw = match signals {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(ValidationError::EmptySignals),
        };

        let mut signals = BTreeMap::new();
        for (name, value) in raw {
            let value = value
                .as_f64()
                .ok_or_else(|| ValidationError::NonNumericValue(name.clone()))?;
            signals.insert(name.clone(), value);
        }

        Self::new(timestamp, signals)
    }

    #[cfg(test)]
    pub(crate) fn new_unchecked(timestamp: DateTime<Utc>, signals: BTreeMap<String, f64>) -> Self {
        Self { timestamp, signals }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn signals(&self) -> &BTreeMap<String, f64> {
        &self.signals
    }

    /// Number of points this batch expands to
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// One point per signal, all stamped with the same `recorded_at`
    pub fn to_points(&self, recorded_at: DateTime<Utc>) -> Vec<TelemetryPoint> {
        self.signals
            .iter()
            .map(|(name, &value)| TelemetryPoint::new(name.clone(), value, self.timestamp, recorded_at))
            .collect()
    }
}

/// Parse an ISO-8601 timestamp
///
/// RFC 3339 strings with an offset are converted to UTC. Date-times without
/// an offset are taken to be UTC already.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingTimestamp);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidTimestamp(raw.to_string()))
}

fn validate_signal_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptySignalName);
    }
    if name.chars().count() > MAX_SIGNAL_NAME_LEN {
        let prefix: String = name.chars().take(20).collect();
        return Err(ValidationError::SignalNameTooLong {
            prefix,
            max: MAX_SIGNAL_NAME_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn signals(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_parse_valid_batch() {
        let raw = signals(json!({"sine_wave": 5.5, "cosine_wave": 3}));
        let batch = SignalBatch::parse(Some("2024-01-01T00:00:00Z"), Some(&raw)).unwrap();

        assert_eq!(batch.timestamp(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.signals()["cosine_wave"], 3.0);
    }

    #[test]
    fn test_parse_timestamp_with_offset_normalises_to_utc() {
        let ts = parse_timestamp("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_timestamp_as_utc() {
        let ts = parse_timestamp("2024-01-01T12:00:00.123456").unwrap();
        let expected =
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::microseconds(123_456);
        assert_eq!(ts, expected);

        let ts = parse_timestamp("2024-01-01 12:00:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_sub_microsecond_digits_are_truncated() {
        let raw = signals(json!({"s": 1.0}));
        let expected =
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::microseconds(123_456);

        for ts in [
            "2024-01-01T00:00:00.1234567Z",
            "2024-01-01T00:00:00.12345678Z",
            "2024-01-01T00:00:00.123456999Z",
        ] {
            let batch = SignalBatch::parse(Some(ts), Some(&raw)).unwrap();
            assert_eq!(batch.timestamp(), expected, "timestamp: {}", ts);
        }
    }

    #[test]
    fn test_rejects_missing_or_bad_timestamp() {
        let raw = signals(json!({"s": 1.0}));
        assert_eq!(
            SignalBatch::parse(None, Some(&raw)),
            Err(ValidationError::MissingTimestamp)
        );
        assert!(matches!(
            SignalBatch::parse(Some("yesterday-ish"), Some(&raw)),
            Err(ValidationError::InvalidTimestamp(_))
        ));
        assert_eq!(
            SignalBatch::parse(Some("   "), Some(&raw)),
            Err(ValidationError::MissingTimestamp)
        );
    }

    #[test]
    fn test_rejects_empty_or_missing_signals() {
        let empty = Map::new();
        assert_eq!(
            SignalBatch::parse(Some("2024-01-01T00:00:00Z"), Some(&empty)),
            Err(ValidationError::EmptySignals)
        );
        assert_eq!(
            SignalBatch::parse(Some("2024-01-01T00:00:00Z"), None),
            Err(ValidationError::EmptySignals)
        );
    }

    #[test]
    fn test_rejects_non_numeric_value() {
        let raw = signals(json!({"s": "high"}));
        assert_eq!(
            SignalBatch::parse(Some("2024-01-01T00:00:00Z"), Some(&raw)),
            Err(ValidationError::NonNumericValue("s".to_string()))
        );

        let raw = signals(json!({"s": null}));
        assert!(SignalBatch::parse(Some("2024-01-01T00:00:00Z"), Some(&raw)).is_err());
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let ts = Utc::now();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut map = BTreeMap::new();
            map.insert("ok".to_string(), 1.0);
            map.insert("bad".to_string(), bad);
            assert_eq!(
                SignalBatch::new(ts, map),
                Err(ValidationError::NonFiniteValue("bad".to_string()))
            );
        }
    }

    #[test]
    fn test_rejects_bad_signal_names() {
        let ts = Utc::now();

        let mut map = BTreeMap::new();
        map.insert(" ".to_string(), 1.0);
        assert_eq!(SignalBatch::new(ts, map), Err(ValidationError::EmptySignalName));

        let mut map = BTreeMap::new();
        map.insert("x".repeat(MAX_SIGNAL_NAME_LEN + 1), 1.0);
        assert!(matches!(
            SignalBatch::new(ts, map),
            Err(ValidationError::SignalNameTooLong { .. })
        ));
    }

    #[test]
    fn test_to_points_expands_every_signal() {
        let raw = signals(json!({"a": 1.0, "b": 2.0, "c": 3.0}));
        let batch = SignalBatch::parse(Some("2024-01-01T00:00:00Z"), Some(&raw)).unwrap();
        let recorded_at = Utc::now();

        let points = batch.to_points(recorded_at);
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.timestamp == batch.timestamp()));
        assert!(points.iter().all(|p| p.recorded_at == recorded_at));
        let names: Vec<&str> = points.iter().map(|p| p.signal_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
