// Conflict detector
//
// Two events conflict iff their [start, end) intervals intersect. An event
// with no end time is a zero-duration point unless the caller assigns it a
// nominal span. Overlaps surface as a warning in the reply, never as a hard
// rejection.

use chrono::{DateTime, Duration, Utc};

use crate::event::Event;

/// Half-open candidate interval; `end = None` means zero-duration point
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    fn effective_end(&self, open_duration: Option<Duration>) -> DateTime<Utc> {
        match (self.end, open_duration) {
            (Some(end), _) => end,
            (None, Some(span)) => self.start + span,
            (None, None) => self.start,
        }
    }
}

/// Events from `candidates` whose time window intersects `candidate`
///
/// `exclude` removes one event id from consideration (the event being
/// updated never conflicts with itself). `open_duration` assigns a span to
/// open-ended events; None treats them as points.
pub fn find_overlaps<'a>(
    candidates: &'a [Event],
    candidate: Interval,
    exclude: Option<i64>,
    open_duration: Option<Duration>,
) -> Vec<&'a Event> {
    candidates
        .iter()
        .filter(|event| exclude != Some(event.id))
        .filter(|event| {
            let other = Interval::new(event.start_time, event.end_time);
            intervals_overlap(candidate, other, open_duration)
        })
        .collect()
}

/// Half-open interval intersection with point semantics
///
/// A zero-duration point p overlaps [s, e) iff s <= p < e; two points
/// overlap iff they coincide.
pub fn intervals_overlap(a: Interval, b: Interval, open_duration: Option<Duration>) -> bool {
    let a_end = a.effective_end(open_duration);
    let b_end = b.effective_end(open_duration);
    let a_point = a_end <= a.start;
    let b_point = b_end <= b.start;

    match (a_point, b_point) {
        (true, true) => a.start == b.start,
        (true, false) => b.start <= a.start && a.start < b_end,
        (false, true) => a.start <= b.start && b.start < a_end,
        (false, false) => a.start < b_end && b.start < a_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 5, h, m, 0).unwrap()
    }

    fn event(id: i64, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Event {
        Event {
            id,
            user_id: Uuid::now_v7(),
            title: format!("event-{id}"),
            start_time: start,
            end_time: end,
            location: None,
            description: None,
            source_type: EventSource::Manual,
            is_followed: true,
            recurrence_rule: None,
            recurrence_end: None,
            created_at: ts(0, 0),
        }
    }

    #[test]
    fn overlap_is_symmetric() {
        let pairs = [
            (Interval::new(ts(10, 0), Some(ts(12, 0))), Interval::new(ts(11, 0), Some(ts(13, 0)))),
            (Interval::new(ts(10, 0), Some(ts(12, 0))), Interval::new(ts(12, 0), Some(ts(13, 0)))),
            (Interval::new(ts(10, 0), None), Interval::new(ts(9, 0), Some(ts(11, 0)))),
            (Interval::new(ts(10, 0), None), Interval::new(ts(10, 0), None)),
        ];
        for (a, b) in pairs {
            assert_eq!(
                intervals_overlap(a, b, None),
                intervals_overlap(b, a, None),
                "symmetry violated for {a:?} / {b:?}"
            );
        }
    }

    #[test]
    fn half_open_intervals_touching_do_not_overlap() {
        let a = Interval::new(ts(10, 0), Some(ts(11, 0)));
        let b = Interval::new(ts(11, 0), Some(ts(12, 0)));
        assert!(!intervals_overlap(a, b, None));
    }

    #[test]
    fn point_inside_interval_overlaps() {
        let point = Interval::new(ts(10, 30), None);
        let span = Interval::new(ts(10, 0), Some(ts(11, 0)));
        assert!(intervals_overlap(point, span, None));

        // A point at the exclusive end does not
        let at_end = Interval::new(ts(11, 0), None);
        assert!(!intervals_overlap(at_end, span, None));
    }

    #[test]
    fn open_duration_gives_open_events_a_span() {
        let open = Interval::new(ts(10, 0), None);
        let later = Interval::new(ts(10, 30), Some(ts(11, 0)));
        assert!(!intervals_overlap(open, later, None));
        assert!(intervals_overlap(open, later, Some(Duration::hours(1))));
    }

    #[test]
    fn find_overlaps_excludes_the_updated_event() {
        let events = vec![
            event(1, ts(10, 0), Some(ts(12, 0))),
            event(2, ts(11, 0), Some(ts(13, 0))),
        ];
        let overlaps = find_overlaps(
            &events,
            Interval::new(ts(10, 30), Some(ts(11, 30))),
            Some(1),
            None,
        );
        let ids: Vec<i64> = overlaps.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2]);
    }
}
