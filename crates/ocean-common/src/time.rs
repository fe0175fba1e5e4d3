//! Time handling for dataset queries.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A time supplied by a caller, decided once at the API boundary.
///
/// Calendar dates mean "start of that day (UTC)". Everything below the
/// boundary works with [`QueryTime::to_instant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryTime {
    /// A whole day without a time of day
    CalendarDate(NaiveDate),
    /// A specific instant
    Instant(DateTime<Utc>),
}

impl QueryTime {
    /// Normalize to a single UTC instant.
    pub fn to_instant(&self) -> DateTime<Utc> {
        match self {
            QueryTime::CalendarDate(date) => Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
            QueryTime::Instant(instant) => *instant,
        }
    }

    /// Parse an ISO 8601 date or datetime.
    ///
    /// A bare date ("2024-01-15") becomes a [`QueryTime::CalendarDate`];
    /// anything with a time component becomes a [`QueryTime::Instant`],
    /// assuming UTC when no offset is given.
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        let s = s.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(QueryTime::Instant(dt.with_timezone(&Utc)));
        }

        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Ok(QueryTime::Instant(Utc.from_utc_datetime(&ndt)));
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(QueryTime::CalendarDate(date));
        }

        Err(TimeParseError::InvalidFormat(s.to_string()))
    }
}

impl From<NaiveDate> for QueryTime {
    fn from(date: NaiveDate) -> Self {
        QueryTime::CalendarDate(date)
    }
}

impl From<DateTime<Utc>> for QueryTime {
    fn from(instant: DateTime<Utc>) -> Self {
        QueryTime::Instant(instant)
    }
}

impl fmt::Display for QueryTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTime::CalendarDate(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            QueryTime::Instant(instant) => write!(f, "{}", instant.format("%Y-%m-%dT%H:%M:%SZ")),
        }
    }
}

/// Output cadence of a dataset's time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    Hourly,
    Daily,
}

impl Cadence {
    /// Truncate an instant to this cadence's boundary.
    ///
    /// Hourly cadence leaves the instant untouched; daily cadence moves it
    /// to midnight of the same day.
    pub fn truncate(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Hourly => instant,
            Cadence::Daily => truncate_to_midnight(instant),
        }
    }

    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hourly" => Some(Cadence::Hourly),
            "daily" => Some(Cadence::Daily),
            _ => None,
        }
    }
}

/// A closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Zero-length interval at a single instant.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::new(instant, instant)
    }

    /// Build from boundary query times.
    pub fn from_query(start: QueryTime, end: QueryTime) -> Self {
        Self::new(start.to_instant(), end.to_instant())
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Both endpoints truncated to the dataset cadence.
    pub fn truncated(&self, cadence: Cadence) -> Self {
        Self::new(cadence.truncate(self.start), cadence.truncate(self.end))
    }

    /// Every whole hour between the rounded endpoints, inclusive.
    pub fn hourly_steps(&self) -> Vec<DateTime<Utc>> {
        hour_range(round_to_hour(self.start), round_to_hour(self.end))
    }
}

/// Drop minutes, seconds and sub-seconds.
pub fn truncate_to_hour(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_minute(0)
        .and_then(|dt| dt.with_second(0))
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(instant)
}

/// Round to the nearest whole hour; half past rounds up.
pub fn round_to_hour(instant: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = truncate_to_hour(instant);
    if instant - truncated >= Duration::minutes(30) {
        truncated + Duration::hours(1)
    } else {
        truncated
    }
}

/// Midnight (UTC) of the same day.
pub fn truncate_to_midnight(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&instant.date_naive().and_time(NaiveTime::MIN))
}

/// Hourly steps from `start` to `end`, both inclusive. Empty when `end`
/// precedes `start`.
pub fn hour_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut steps = Vec::new();
    let mut current = start;

    while current <= end {
        steps.push(current);
        current += Duration::hours(1);
    }

    steps
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_date_and_instant() {
        let date = QueryTime::parse("2024-01-15").unwrap();
        assert!(matches!(date, QueryTime::CalendarDate(_)));
        assert_eq!(date.to_instant().hour(), 0);

        let instant = QueryTime::parse("2024-01-15T12:30:00Z").unwrap();
        match instant {
            QueryTime::Instant(dt) => {
                assert_eq!(dt.day(), 15);
                assert_eq!(dt.hour(), 12);
                assert_eq!(dt.minute(), 30);
            }
            _ => panic!("Expected instant"),
        }

        assert!(QueryTime::parse("yesterday").is_err());
    }

    #[test]
    fn test_cadence_parse() {
        assert_eq!(Cadence::parse("Daily"), Some(Cadence::Daily));
        assert_eq!(Cadence::parse("hourly"), Some(Cadence::Hourly));
        assert_eq!(Cadence::parse("weekly"), None);
    }

    #[test]
    fn test_interval_truncated_to_cadence() {
        let start = Utc.with_ymd_and_hms(2024, 1, 16, 12, 40, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 17, 6, 0, 0).unwrap();
        let interval = TimeInterval::new(start, end);

        let daily = interval.truncated(Cadence::Daily);
        assert_eq!(daily.start, Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap());
        assert_eq!(daily.end, Utc.with_ymd_and_hms(2024, 1, 17, 0, 0, 0).unwrap());
        assert_eq!(interval.truncated(Cadence::Hourly), interval);
    }

    #[test]
    fn test_round_to_hour() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 12, 29, 59).unwrap();
        assert_eq!(round_to_hour(t), Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());

        let t = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap();
        assert_eq!(round_to_hour(t), Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap());

        let t = Utc.with_ymd_and_hms(2024, 1, 15, 23, 45, 0).unwrap();
        assert_eq!(round_to_hour(t), Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_hour_range_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap();
        assert_eq!(hour_range(start, end).len(), 4);
        assert_eq!(hour_range(start, start).len(), 1);
        assert!(hour_range(end, start).is_empty());
    }

    #[test]
    fn test_daily_cadence_truncates() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 17, 5, 0).unwrap();
        assert_eq!(
            Cadence::Daily.truncate(t),
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(Cadence::Hourly.truncate(t), t);
    }
}
