//! Time bucketing shared by the SQL builder and the time-series shaper.
//!
//! Both sides must truncate identically: UTC, weeks start on Monday (the
//! same convention as `date_trunc('week', ...)` in the store).

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Requested time-dimension granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Auto,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

/// A concrete bucket width, after `auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Resolve `auto` from the width of the queried range.
    pub fn resolve(self, from: DateTime<Utc>, to: DateTime<Utc>) -> TimeBucket {
        match self {
            Granularity::Minute => TimeBucket::Minute,
            Granularity::Hour => TimeBucket::Hour,
            Granularity::Day => TimeBucket::Day,
            Granularity::Week => TimeBucket::Week,
            Granularity::Month => TimeBucket::Month,
            Granularity::Auto => {
                let span = to - from;
                if span < Duration::hours(2) {
                    TimeBucket::Minute
                } else if span < Duration::days(3) {
                    TimeBucket::Hour
                } else if span < Duration::days(60) {
                    TimeBucket::Day
                } else if span < Duration::days(365) {
                    TimeBucket::Week
                } else {
                    TimeBucket::Month
                }
            }
        }
    }
}

impl TimeBucket {
    /// Unit literal passed to `date_trunc`.
    pub fn sql_unit(&self) -> &'static str {
        match self {
            TimeBucket::Minute => "minute",
            TimeBucket::Hour => "hour",
            TimeBucket::Day => "day",
            TimeBucket::Week => "week",
            TimeBucket::Month => "month",
        }
    }

    /// Start of the bucket containing `ts`.
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start_of_day = |d: chrono::NaiveDate| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN));
        match self {
            TimeBucket::Minute => ts
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(ts),
            TimeBucket::Hour => ts
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(ts),
            TimeBucket::Day => start_of_day(date),
            TimeBucket::Week => {
                let back = date.weekday().num_days_from_monday() as i64;
                start_of_day(date - Duration::days(back))
            }
            TimeBucket::Month => start_of_day(date.with_day(1).unwrap_or(date)),
        }
    }

    /// Start of the bucket following the one that starts at `bucket_start`.
    pub fn next(&self, bucket_start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeBucket::Minute => bucket_start + Duration::minutes(1),
            TimeBucket::Hour => bucket_start + Duration::hours(1),
            TimeBucket::Day => bucket_start + Duration::days(1),
            TimeBucket::Week => bucket_start + Duration::weeks(1),
            TimeBucket::Month => bucket_start
                .checked_add_months(Months::new(1))
                .unwrap_or(bucket_start + Duration::days(31)),
        }
    }

    /// Number of buckets `buckets(from, to)` would return, without building them.
    pub fn bucket_count(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
        if from > to {
            return 0;
        }
        let first = self.truncate(from);
        let last = self.truncate(to);
        let width = match self {
            TimeBucket::Minute => Duration::minutes(1),
            TimeBucket::Hour => Duration::hours(1),
            TimeBucket::Day => Duration::days(1),
            TimeBucket::Week => Duration::weeks(1),
            TimeBucket::Month => {
                let months = (last.year() - first.year()) as i64 * 12 + last.month() as i64
                    - first.month() as i64;
                return months + 1;
            }
        };
        (last - first).num_milliseconds() / width.num_milliseconds() + 1
    }

    /// Every bucket start from the bucket containing `from` through the one containing `to`.
    pub fn buckets(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut out = Vec::new();
        if from > to {
            return out;
        }
        let last = self.truncate(to);
        let mut cur = self.truncate(from);
        while cur <= last {
            out.push(cur);
            cur = self.next(cur);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_bucket_count_matches_buckets() {
        let from = ts("2024-01-30T22:10:00Z");
        let to = ts("2024-04-02T03:00:00Z");
        for bucket in [
            TimeBucket::Minute,
            TimeBucket::Hour,
            TimeBucket::Day,
            TimeBucket::Week,
            TimeBucket::Month,
        ] {
            assert_eq!(
                bucket.bucket_count(from, to),
                bucket.buckets(from, to).len() as i64,
                "{bucket:?}"
            );
        }
        assert_eq!(TimeBucket::Day.bucket_count(to, from), 0);
        assert_eq!(
            TimeBucket::Minute.bucket_count(ts("2015-01-01T00:00:00Z"), ts("2025-01-01T00:00:00Z")),
            5_260_321
        );
    }

    #[test]
    fn test_truncate_each_bucket() {
        let t = ts("2024-03-14T15:42:31.250Z");
        assert_eq!(TimeBucket::Minute.truncate(t), ts("2024-03-14T15:42:00Z"));
        assert_eq!(TimeBucket::Hour.truncate(t), ts("2024-03-14T15:00:00Z"));
        assert_eq!(TimeBucket::Day.truncate(t), ts("2024-03-14T00:00:00Z"));
        // 2024-03-14 is a Thursday
        assert_eq!(TimeBucket::Week.truncate(t), ts("2024-03-11T00:00:00Z"));
        assert_eq!(TimeBucket::Month.truncate(t), ts("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn test_week_truncation_on_monday_and_sunday() {
        assert_eq!(
            TimeBucket::Week.truncate(ts("2024-03-11T08:00:00Z")),
            ts("2024-03-11T00:00:00Z")
        );
        assert_eq!(
            TimeBucket::Week.truncate(ts("2024-03-17T23:59:59Z")),
            ts("2024-03-11T00:00:00Z")
        );
    }

    #[test]
    fn test_day_buckets_inclusive() {
        let b = TimeBucket::Day.buckets(ts("2024-01-01T10:00:00Z"), ts("2024-01-07T02:00:00Z"));
        assert_eq!(b.len(), 7);
        assert_eq!(b[0], ts("2024-01-01T00:00:00Z"));
        assert_eq!(b[6], ts("2024-01-07T00:00:00Z"));
    }

    #[test]
    fn test_month_buckets_cross_year() {
        let b = TimeBucket::Month.buckets(ts("2023-11-15T00:00:00Z"), ts("2024-02-01T00:00:00Z"));
        assert_eq!(
            b,
            vec![
                ts("2023-11-01T00:00:00Z"),
                ts("2023-12-01T00:00:00Z"),
                ts("2024-01-01T00:00:00Z"),
                ts("2024-02-01T00:00:00Z"),
            ]
        );
    }

    #[test]
    fn test_empty_when_reversed() {
        assert!(TimeBucket::Hour
            .buckets(ts("2024-01-02T00:00:00Z"), ts("2024-01-01T00:00:00Z"))
            .is_empty());
    }

    #[test]
    fn test_auto_resolution() {
        let from = ts("2024-01-01T00:00:00Z");
        let auto = Granularity::Auto;
        assert_eq!(auto.resolve(from, from + Duration::minutes(30)), TimeBucket::Minute);
        assert_eq!(auto.resolve(from, from + Duration::hours(12)), TimeBucket::Hour);
        assert_eq!(auto.resolve(from, from + Duration::days(14)), TimeBucket::Day);
        assert_eq!(auto.resolve(from, from + Duration::days(120)), TimeBucket::Week);
        assert_eq!(auto.resolve(from, from + Duration::days(800)), TimeBucket::Month);
        assert_eq!(Granularity::Hour.resolve(from, from), TimeBucket::Hour);
    }
}
