// Core traits for pluggable backends
//
// These traits let the engine run against different backends:
// - In-memory implementations for examples and testing (memory module)
// - Postgres implementation for production (followup-storage)
// - An OpenAI-backed capability for production (followup-openai)
// - A scripted capability double for deterministic tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::capability::{CreateExtraction, EventMatch, IntentClassification};
use crate::error::Result;
use crate::event::{Event, EventPatch, NewEvent};
use crate::turn::{ConversationTurn, HistoryEntry};

// ============================================================================
// EventStore - Ordered per-user event collection
// ============================================================================

/// Trait for storing and retrieving a user's events
///
/// Every operation is scoped to `user_id`: an id from another user's scope
/// is always `NotFound`, never leaked. Implementations own the per-user id
/// sequence and must never reuse an id after deletion.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Create an event, assigning the next id in the user's sequence
    async fn create(&self, user_id: Uuid, event: NewEvent) -> Result<Event>;

    /// Fetch a single event; NotFound when absent from this user's scope
    async fn get(&self, user_id: Uuid, event_id: i64) -> Result<Event>;

    /// List the user's events in insertion order
    async fn list(&self, user_id: Uuid, followed_only: bool) -> Result<Vec<Event>>;

    /// Apply a partial update; absent patch fields are untouched
    async fn update(&self, user_id: Uuid, event_id: i64, patch: EventPatch) -> Result<Event>;

    /// Delete an event; false (not an error) when the id is already gone
    async fn delete(&self, user_id: Uuid, event_id: i64) -> Result<bool>;
}

// ============================================================================
// LanguageCapability - External inference boundary
// ============================================================================

/// Abstract language/vision capability consumed by the engine
///
/// Implementations may call an LLM, a rule engine, or a test double. Each
/// operation is a single request/response across an external boundary: it
/// may be slow and may fail. Contract: fail with `CapabilityUnavailable` on
/// transport or timeout errors and `CapabilityMalformed` when the response
/// cannot be parsed into the expected shape. The engine degrades to a
/// chat-style reply on either; it never crashes on a capability failure.
#[async_trait]
pub trait LanguageCapability: Send + Sync {
    /// Classify the intent of a user turn
    async fn classify_intent(
        &self,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
    ) -> Result<IntentClassification>;

    /// Extract event-creation fields explicitly supplied by the turn
    async fn extract_create_fields(
        &self,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
        now: DateTime<Utc>,
    ) -> Result<CreateExtraction>;

    /// Extract only the fields a user message explicitly asks to change
    async fn extract_update_fields(
        &self,
        original: &Event,
        user_message: &str,
    ) -> Result<EventPatch>;

    /// Resolve which candidate event a vague user description points to
    async fn match_referenced_event(
        &self,
        candidates: &[Event],
        history: &[HistoryEntry],
        user_description: &str,
    ) -> Result<EventMatch>;

    /// Produce a user-facing summary of the given events for a query
    async fn summarize_for_query(
        &self,
        events: &[Event],
        user_request: &str,
        now: DateTime<Utc>,
    ) -> Result<String>;
}
