//! Timestamp value object for immutable points in time.
//!
//! All billing arithmetic is done in absolute days on UTC instants, never in
//! calendar months, so period lengths do not depend on month length or
//! timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a timestamp at midnight UTC of the given date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the UTC calendar date of this instant.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Creates a new timestamp by subtracting the specified number of days.
    pub fn minus_days(&self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Parses the date formats the payment gateway emits.
    ///
    /// Accepts RFC 3339 (`2026-03-01T10:00:00Z`), naive date-times
    /// (`2026-03-01 10:00:00`, taken as UTC) and plain dates (`2026-03-01`,
    /// taken as midnight UTC). Returns `None` for anything else.
    pub fn parse_flexible(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.with_timezone(&Utc)));
        }

        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(Self(naive.and_utc()));
            }
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(Self::from_date)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn at(raw: &str) -> Timestamp {
        Timestamp::from_datetime(
            DateTime::parse_from_rfc3339(raw)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn add_days_uses_absolute_days() {
        // January has 31 days, February 28 in 2026; 30 absolute days either way.
        let jan = at("2026-01-31T12:00:00Z");
        assert_eq!(jan.add_days(30), at("2026-03-02T12:00:00Z"));
    }

    #[test]
    fn minus_days_inverts_add_days() {
        let ts = at("2026-05-10T08:15:00Z");
        assert_eq!(ts.add_days(45).minus_days(45), ts);
    }

    #[test]
    fn duration_since_is_signed() {
        let a = at("2026-01-01T00:00:00Z");
        let b = a.add_days(7);
        assert_eq!(b.duration_since(&a).num_days(), 7);
        assert_eq!(a.duration_since(&b).num_days(), -7);
    }

    #[test]
    fn is_before_and_after_are_strict() {
        let a = at("2026-01-01T00:00:00Z");
        let b = at("2026-01-01T00:00:01Z");
        assert!(a.is_before(&b));
        assert!(b.is_after(&a));
        assert!(!a.is_before(&a));
        assert!(!a.is_after(&a));
    }

    #[test]
    fn parse_flexible_accepts_rfc3339() {
        let ts = Timestamp::parse_flexible("2026-03-01T10:30:00-03:00").unwrap();
        assert_eq!(ts.as_datetime().hour(), 13);
    }

    #[test]
    fn parse_flexible_accepts_plain_date_as_midnight_utc() {
        let ts = Timestamp::parse_flexible("2026-03-01").unwrap();
        assert_eq!(ts, at("2026-03-01T00:00:00Z"));
    }

    #[test]
    fn parse_flexible_accepts_naive_datetime() {
        let ts = Timestamp::parse_flexible("2026-03-01 18:45:00").unwrap();
        assert_eq!(ts.as_datetime().minute(), 45);
        assert_eq!(ts.as_datetime().day(), 1);
    }

    #[test]
    fn parse_flexible_rejects_garbage() {
        assert!(Timestamp::parse_flexible("").is_none());
        assert!(Timestamp::parse_flexible("   ").is_none());
        assert!(Timestamp::parse_flexible("01/03/2026").is_none());
        assert!(Timestamp::parse_flexible("yesterday").is_none());
    }

    #[test]
    fn date_returns_utc_calendar_date() {
        let ts = at("2026-12-31T23:59:59Z");
        assert_eq!(ts.date().year(), 2026);
        assert_eq!(ts.date().ordinal(), 365);
    }

    #[test]
    fn timestamp_serializes_transparently() {
        let ts = at("2024-01-15T10:30:00Z");
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.contains("2024-01-15"));

        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
