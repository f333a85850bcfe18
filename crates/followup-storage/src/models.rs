// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use followup_core::{Event, EventSource};

// ============================================
// User models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_digest: String,
    /// Highest event id handed out for this user; ids are claimed by
    /// incrementing this column, so they survive event deletion.
    pub next_event_seq: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub display_name: String,
    pub password_digest: String,
}

// ============================================
// Event models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub user_id: Uuid,
    pub event_id: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub source_type: String,
    pub is_followed: bool,
    pub recurrence_rule: Option<String>,
    pub recurrence_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.event_id,
            user_id: row.user_id,
            title: row.title,
            start_time: row.start_time,
            end_time: row.end_time,
            location: row.location,
            description: row.description,
            source_type: EventSource::from(row.source_type.as_str()),
            is_followed: row.is_followed,
            recurrence_rule: row.recurrence_rule,
            recurrence_end: row.recurrence_end,
            created_at: row.created_at,
        }
    }
}
