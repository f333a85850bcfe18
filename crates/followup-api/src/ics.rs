// iCalendar rendering for single events
//
// Renders one VEVENT inside a VCALENDAR wrapper. Recurrence rules are passed
// through verbatim; the backend never expands them into instances.

use chrono::{DateTime, Utc};

use followup_core::Event;

/// Render an event as a text/calendar document
pub fn render_event(event: &Event) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//FollowUp//Calendar//EN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}-{}@followup", event.user_id, event.id),
        format!("DTSTAMP:{}", format_utc(event.created_at)),
        format!("DTSTART:{}", format_utc(event.start_time)),
    ];

    if let Some(end) = event.end_time {
        lines.push(format!("DTEND:{}", format_utc(end)));
    }
    lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
    if let Some(location) = &event.location {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(description) = &event.description {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(rule) = &event.recurrence_rule {
        // RRULE is structured text, not an escaped property value
        lines.push(format!("RRULE:{rule}"));
    }

    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut body = lines.join("\r\n");
    body.push_str("\r\n");
    body
}

fn format_utc(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape TEXT property values per RFC 5545 §3.3.11
fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use followup_core::EventSource;
    use uuid::Uuid;

    fn sample_event() -> Event {
        Event {
            id: 7,
            user_id: Uuid::nil(),
            title: "Dinner, then drinks".to_string(),
            start_time: Utc.with_ymd_and_hms(2026, 2, 5, 19, 0, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2026, 2, 5, 20, 0, 0).unwrap()),
            location: Some("Luigi's; backroom".to_string()),
            description: None,
            source_type: EventSource::Text,
            is_followed: true,
            recurrence_rule: Some("FREQ=WEEKLY;BYDAY=TH".to_string()),
            recurrence_end: None,
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn renders_complete_vevent() {
        let ics = render_event(&sample_event());
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART:20260205T190000Z\r\n"));
        assert!(ics.contains("DTEND:20260205T200000Z\r\n"));
        assert!(ics.contains("SUMMARY:Dinner\\, then drinks\r\n"));
        assert!(ics.contains("LOCATION:Luigi's\\; backroom\r\n"));
        assert!(ics.contains("RRULE:FREQ=WEEKLY;BYDAY=TH\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn open_events_have_no_dtend() {
        let mut event = sample_event();
        event.end_time = None;
        let ics = render_event(&event);
        assert!(!ics.contains("DTEND"));
    }
}
