// Postgres storage layer with sqlx
//
// This crate provides database implementations for core traits:
// - PgEventStore: implements EventStore for calendar event persistence

pub mod event_store;
pub mod models;
pub mod repositories;

pub use event_store::PgEventStore;
pub use models::*;
pub use repositories::Database;
