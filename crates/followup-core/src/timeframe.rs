// Deterministic time-range inference for schedule queries
//
// Maps relative-time wording in a query ("tomorrow", "next week") to a
// half-open [start, end) window. The engine filters events by this window
// before the capability formats them, so the filter stays testable without
// a model.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

/// Half-open query window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Infer a query window from relative-time wording, or None for unbounded
pub fn infer_time_range(text: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    let text = text.to_lowercase();
    let midnight = day_start(now);

    if text.contains("next week") {
        let start = week_start(now) + Duration::weeks(1);
        return Some(TimeRange {
            start,
            end: start + Duration::weeks(1),
        });
    }
    if text.contains("this week") {
        let start = week_start(now);
        return Some(TimeRange {
            start,
            end: start + Duration::weeks(1),
        });
    }
    if text.contains("weekend") {
        // Upcoming Saturday through Sunday; during a weekend, the current one
        let saturday = week_start(now) + Duration::days(5);
        let start = if midnight > saturday + Duration::days(1) {
            saturday + Duration::weeks(1)
        } else {
            saturday
        };
        return Some(TimeRange {
            start,
            end: start + Duration::days(2),
        });
    }
    if text.contains("tomorrow") {
        let start = midnight + Duration::days(1);
        return Some(TimeRange {
            start,
            end: start + Duration::days(1),
        });
    }
    if text.contains("yesterday") {
        let start = midnight - Duration::days(1);
        return Some(TimeRange {
            start,
            end: start + Duration::days(1),
        });
    }
    if text.contains("today") || text.contains("tonight") {
        return Some(TimeRange {
            start: midnight,
            end: midnight + Duration::days(1),
        });
    }

    None
}

fn day_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn week_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = instant.weekday().num_days_from_monday() as i64;
    day_start(instant) - Duration::days(days_from_monday)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2026-02-05 is a Thursday
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 5, 14, 30, 0).unwrap()
    }

    fn ts(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, d, h, 0, 0).unwrap()
    }

    #[test]
    fn tomorrow_is_a_24h_window() {
        let range = infer_time_range("what's on my schedule tomorrow", now()).unwrap();
        assert_eq!(range.start, ts(6, 0));
        assert_eq!(range.end, ts(7, 0));
        assert!(range.contains(ts(6, 19)));
        assert!(!range.contains(ts(7, 0)));
    }

    #[test]
    fn this_week_starts_monday() {
        let range = infer_time_range("show me this week", now()).unwrap();
        assert_eq!(range.start, ts(2, 0));
        assert_eq!(range.end, ts(9, 0));
    }

    #[test]
    fn next_week_follows_this_week() {
        let range = infer_time_range("anything next week?", now()).unwrap();
        assert_eq!(range.start, ts(9, 0));
        assert_eq!(range.end, ts(16, 0));
    }

    #[test]
    fn weekend_is_saturday_and_sunday() {
        let range = infer_time_range("am I free this weekend", now()).unwrap();
        assert_eq!(range.start, ts(7, 0));
        assert_eq!(range.end, ts(9, 0));
    }

    #[test]
    fn plain_queries_are_unbounded() {
        assert!(infer_time_range("show me all my events", now()).is_none());
    }
}
