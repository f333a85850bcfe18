// Database-backed EventStore implementation
//
// Implements the core EventStore trait over Postgres. Per-user event ids
// come from the owner row's next_event_seq counter, claimed inside the
// insert transaction, so deleted ids are never reused.

use async_trait::async_trait;
use uuid::Uuid;

use followup_core::{EngineError, Event, EventPatch, EventStore, NewEvent, Result};

use crate::repositories::Database;

/// Postgres-backed event store
#[derive(Clone)]
pub struct PgEventStore {
    db: Database,
}

impl PgEventStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn create(&self, user_id: Uuid, event: NewEvent) -> Result<Event> {
        let row = self.db.create_event(user_id, event).await?;
        Ok(row.into())
    }

    async fn get(&self, user_id: Uuid, event_id: i64) -> Result<Event> {
        self.db
            .get_event(user_id, event_id)
            .await?
            .map(Event::from)
            .ok_or(EngineError::NotFound(event_id))
    }

    async fn list(&self, user_id: Uuid, followed_only: bool) -> Result<Vec<Event>> {
        let rows = self.db.list_events(user_id, followed_only).await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn update(&self, user_id: Uuid, event_id: i64, patch: EventPatch) -> Result<Event> {
        self.db
            .update_event(user_id, event_id, patch)
            .await?
            .map(Event::from)
            .ok_or(EngineError::NotFound(event_id))
    }

    async fn delete(&self, user_id: Uuid, event_id: i64) -> Result<bool> {
        Ok(self.db.delete_event(user_id, event_id).await?)
    }
}
