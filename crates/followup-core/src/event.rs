// Event domain types
//
// The Event entity plus the partial projections used during slot filling
// (EventDraft) and updates (EventPatch). Shared by API and storage crates.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{EngineError, Result};

/// Provenance of an event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Manual,
    Text,
    Image,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSource::Manual => write!(f, "manual"),
            EventSource::Text => write!(f, "text"),
            EventSource::Image => write!(f, "image"),
        }
    }
}

impl From<&str> for EventSource {
    fn from(s: &str) -> Self {
        match s {
            "text" => EventSource::Text,
            "image" => EventSource::Image,
            _ => EventSource::Manual,
        }
    }
}

/// A calendar event owned by a single user
///
/// `id` is a per-user sequence number: unique within the owner's scope and
/// never reused after deletion. `user_id`, `source_type` and `created_at`
/// are immutable after creation. Recurrence fields are stored opaquely and
/// never expanded into instances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Event {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source_type: EventSource,
    pub is_followed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields of an event that slot filling collects
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EventField {
    Title,
    StartTime,
    EndTime,
    Location,
    Description,
}

impl std::fmt::Display for EventField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventField::Title => write!(f, "title"),
            EventField::StartTime => write!(f, "start_time"),
            EventField::EndTime => write!(f, "end_time"),
            EventField::Location => write!(f, "location"),
            EventField::Description => write!(f, "description"),
        }
    }
}

/// Partial event projection collected across conversation turns
///
/// Every field is optional; merging is per field, last-write-wins. A draft
/// becomes a `NewEvent` only once the required fields are present and valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EventDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub recurrence_end: Option<DateTime<Utc>>,
}

impl EventDraft {
    /// Merge newly extracted fields into this draft
    ///
    /// Only fields present in `other` overwrite; previously collected fields
    /// are never dropped. Last write wins per field, not per turn.
    pub fn merge_from(&mut self, other: &EventDraft) {
        if other.title.is_some() {
            self.title = other.title.clone();
        }
        if other.start_time.is_some() {
            self.start_time = other.start_time;
        }
        if other.end_time.is_some() {
            self.end_time = other.end_time;
        }
        if other.location.is_some() {
            self.location = other.location.clone();
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.recurrence_rule.is_some() {
            self.recurrence_rule = other.recurrence_rule.clone();
        }
        if other.recurrence_end.is_some() {
            self.recurrence_end = other.recurrence_end;
        }
    }

    /// Required fields still absent from this draft
    pub fn missing_required(&self) -> Vec<EventField> {
        let mut missing = Vec::new();
        if self.title.as_deref().map(str::trim).unwrap_or("").is_empty() {
            missing.push(EventField::Title);
        }
        if self.start_time.is_none() {
            missing.push(EventField::StartTime);
        }
        missing
    }

    /// Number of fields currently present
    pub fn present_count(&self) -> usize {
        [
            self.title.is_some(),
            self.start_time.is_some(),
            self.end_time.is_some(),
            self.location.is_some(),
            self.description.is_some(),
            self.recurrence_rule.is_some(),
            self.recurrence_end.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }
}

/// Validated payload for event creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct NewEvent {
    pub title: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub source_type: EventSource,
    #[serde(default = "default_followed")]
    pub is_followed: bool,
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub recurrence_end: Option<DateTime<Utc>>,
}

fn default_followed() -> bool {
    true
}

impl NewEvent {
    /// Validate a completed draft into a creation payload
    ///
    /// Applies the default end time (`start + default_duration`) when unset
    /// and stamps the provenance from the turn that started the session.
    pub fn from_draft(
        draft: EventDraft,
        source: EventSource,
        default_duration: Duration,
    ) -> Result<Self> {
        let title = draft
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EngineError::validation("event title must not be empty"))?
            .to_string();
        let start_time = draft
            .start_time
            .ok_or_else(|| EngineError::validation("event start time is required"))?;
        let end_time = match draft.end_time {
            Some(end) if end < start_time => {
                return Err(EngineError::validation(
                    "event end time must not be before its start time",
                ))
            }
            Some(end) => Some(end),
            None => Some(start_time + default_duration),
        };

        Ok(Self {
            title,
            start_time,
            end_time,
            location: draft.location,
            description: draft.description,
            source_type: source,
            is_followed: true,
            recurrence_rule: draft.recurrence_rule,
            recurrence_end: draft.recurrence_end,
        })
    }

    /// Validate a directly supplied payload (manual creation via the API)
    pub fn validated(self) -> Result<Self> {
        if self.title.trim().is_empty() {
            return Err(EngineError::validation("event title must not be empty"));
        }
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(EngineError::validation(
                    "event end time must not be before its start time",
                ));
            }
        }
        Ok(self)
    }
}

/// Partial update payload: only present fields are applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_followed: Option<bool>,
}

impl EventPatch {
    /// True when no fields are present
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.location.is_none()
            && self.description.is_none()
            && self.is_followed.is_none()
    }

    /// Validate this patch against the event it would be applied to
    pub fn validate_against(&self, original: &Event) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(EngineError::validation("event title must not be empty"));
            }
        }
        let start = self.start_time.unwrap_or(original.start_time);
        let end = self.end_time.or(original.end_time);
        if let Some(end) = end {
            if end < start {
                return Err(EngineError::validation(
                    "event end time must not be before its start time",
                ));
            }
        }
        Ok(())
    }

    /// Apply this patch to an event, touching only present fields
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(start) = self.start_time {
            event.start_time = start;
        }
        if let Some(end) = self.end_time {
            event.end_time = Some(end);
        }
        if let Some(location) = &self.location {
            event.location = Some(location.clone());
        }
        if let Some(description) = &self.description {
            event.description = Some(description.clone());
        }
        if let Some(followed) = self.is_followed {
            event.is_followed = followed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 5, h, 0, 0).unwrap()
    }

    #[test]
    fn merge_is_last_write_wins_per_field() {
        let mut draft = EventDraft {
            title: Some("Dinner".into()),
            location: Some("Old place".into()),
            ..Default::default()
        };
        draft.merge_from(&EventDraft {
            start_time: Some(ts(19)),
            location: Some("New place".into()),
            ..Default::default()
        });

        assert_eq!(draft.title.as_deref(), Some("Dinner"));
        assert_eq!(draft.start_time, Some(ts(19)));
        assert_eq!(draft.location.as_deref(), Some("New place"));
    }

    #[test]
    fn missing_required_recomputes_from_fields() {
        let mut draft = EventDraft::default();
        assert_eq!(
            draft.missing_required(),
            vec![EventField::Title, EventField::StartTime]
        );

        draft.title = Some("Standup".into());
        assert_eq!(draft.missing_required(), vec![EventField::StartTime]);

        draft.start_time = Some(ts(9));
        assert!(draft.missing_required().is_empty());
    }

    #[test]
    fn blank_title_counts_as_missing() {
        let draft = EventDraft {
            title: Some("   ".into()),
            start_time: Some(ts(9)),
            ..Default::default()
        };
        assert_eq!(draft.missing_required(), vec![EventField::Title]);
    }

    #[test]
    fn from_draft_defaults_end_time() {
        let draft = EventDraft {
            title: Some("Dinner".into()),
            start_time: Some(ts(19)),
            ..Default::default()
        };
        let event = NewEvent::from_draft(draft, EventSource::Text, Duration::hours(1)).unwrap();
        assert_eq!(event.end_time, Some(ts(20)));
        assert_eq!(event.source_type, EventSource::Text);
        assert!(event.is_followed);
    }

    #[test]
    fn from_draft_rejects_end_before_start() {
        let draft = EventDraft {
            title: Some("Dinner".into()),
            start_time: Some(ts(19)),
            end_time: Some(ts(18)),
            ..Default::default()
        };
        let err = NewEvent::from_draft(draft, EventSource::Text, Duration::hours(1)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn patch_validates_against_original() {
        let event = Event {
            id: 1,
            user_id: Uuid::now_v7(),
            title: "Review".into(),
            start_time: ts(14),
            end_time: Some(ts(16)),
            location: None,
            description: None,
            source_type: EventSource::Manual,
            is_followed: true,
            recurrence_rule: None,
            recurrence_end: None,
            created_at: ts(0),
        };

        // Moving the start past the existing end is invalid
        let patch = EventPatch {
            start_time: Some(ts(17)),
            ..Default::default()
        };
        assert!(patch.validate_against(&event).is_err());

        // Moving both is fine
        let patch = EventPatch {
            start_time: Some(ts(17)),
            end_time: Some(ts(18)),
            ..Default::default()
        };
        assert!(patch.validate_against(&event).is_ok());
    }
}
