//! Lookback windows
//!
//! A lookback is the non-negative duration a history query reaches back
//! from "now". Requests express it in (possibly fractional) hours.

use crate::query::error::{QueryError, QueryResult};
use crate::storage::TimeRange;
use chrono::{DateTime, Duration, Utc};

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// How far back a history query reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookback(Duration);

impl Lookback {
    /// Build a lookback from a number of hours
    ///
    /// Rejects negative, NaN and infinite inputs and values too large to
    /// express in microseconds.
    pub fn from_hours(hours: f64) -> QueryResult<Self> {
        if !hours.is_finite() {
            return Err(QueryError::InvalidWindow(format!(
                "hours must be a finite number, got {}",
                hours
            )));
        }
        if hours < 0.0 {
            return Err(QueryError::InvalidWindow(format!(
                "hours must not be negative, got {}",
                hours
            )));
        }

        let micros = (hours * MICROS_PER_HOUR).round();
        if micros >= i64::MAX as f64 {
            return Err(QueryError::InvalidWindow(format!(
                "hours value {} is too large",
                hours
            )));
        }

        Ok(Self(Duration::microseconds(micros as i64)))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// The inclusive window `[now - lookback, now]`
    pub fn window_ending_at(&self, now: DateTime<Utc>) -> QueryResult<TimeRange> {
        let since = now.checked_sub_signed(self.0).ok_or_else(|| {
            QueryError::InvalidWindow("lookback reaches past the earliest representable time".to_string())
        })?;
        Ok(TimeRange::new(since, now))
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Self(Duration::hours(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_is_one_hour() {
        assert_eq!(Lookback::default().duration(), Duration::hours(1));
    }

    #[test]
    fn test_fractional_hours() {
        let lookback = Lookback::from_hours(0.5).unwrap();
        assert_eq!(lookback.duration(), Duration::minutes(30));
    }

    #[test]
    fn test_zero_hours_is_valid() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let range = Lookback::from_hours(0.0).unwrap().window_ending_at(now).unwrap();
        assert_eq!(range.since, now);
        assert_eq!(range.until, now);
    }

    #[test]
    fn test_rejects_bad_hours() {
        assert!(Lookback::from_hours(-1.0).is_err());
        assert!(Lookback::from_hours(f64::NAN).is_err());
        assert!(Lookback::from_hours(f64::INFINITY).is_err());
        assert!(Lookback::from_hours(1e300).is_err());
    }

    #[test]
    fn test_window_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let range = Lookback::from_hours(2.0).unwrap().window_ending_at(now).unwrap();
        assert_eq!(range.since, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.until, now);
    }

    #[test]
    fn test_window_overflow_is_error() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let lookback = Lookback::from_hours(2.5e9).unwrap();
        assert!(matches!(
            lookback.window_ending_at(now),
            Err(QueryError::InvalidWindow(_))
        ));
    }
}
