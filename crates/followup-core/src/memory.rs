// In-memory implementations for examples and testing
//
// These implementations keep all data in memory, making them perfect for:
// - Unit and integration tests
// - Standalone examples that don't need a database
// - Quick prototyping

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::capability::{CreateExtraction, EventMatch, Intent, IntentClassification};
use crate::error::{EngineError, Result};
use crate::event::{Event, EventPatch, NewEvent};
use crate::traits::{EventStore, LanguageCapability};
use crate::turn::{ConversationTurn, HistoryEntry};

// ============================================================================
// InMemoryEventStore - Per-user event collections in memory
// ============================================================================

#[derive(Debug, Default)]
struct UserEvents {
    events: Vec<Event>,
    next_id: i64,
}

/// In-memory event store
///
/// Keeps each user's events in insertion order with a per-user id counter
/// that starts at 1 and never reuses an id after deletion.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventStore {
    users: Arc<RwLock<HashMap<Uuid, UserEvents>>>,
}

impl InMemoryEventStore {
    /// Create a new in-memory event store
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total events across all users (useful in tests)
    pub async fn total_events(&self) -> usize {
        self.users
            .read()
            .await
            .values()
            .map(|u| u.events.len())
            .sum()
    }

    /// Clear all events
    pub async fn clear(&self) {
        self.users.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn create(&self, user_id: Uuid, event: NewEvent) -> Result<Event> {
        let mut users = self.users.write().await;
        let user = users.entry(user_id).or_default();
        user.next_id += 1;

        let event = Event {
            id: user.next_id,
            user_id,
            title: event.title,
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location,
            description: event.description,
            source_type: event.source_type,
            is_followed: event.is_followed,
            recurrence_rule: event.recurrence_rule,
            recurrence_end: event.recurrence_end,
            created_at: Utc::now(),
        };
        user.events.push(event.clone());
        Ok(event)
    }

    async fn get(&self, user_id: Uuid, event_id: i64) -> Result<Event> {
        self.users
            .read()
            .await
            .get(&user_id)
            .and_then(|u| u.events.iter().find(|e| e.id == event_id))
            .cloned()
            .ok_or(EngineError::NotFound(event_id))
    }

    async fn list(&self, user_id: Uuid, followed_only: bool) -> Result<Vec<Event>> {
        Ok(self
            .users
            .read()
            .await
            .get(&user_id)
            .map(|u| {
                u.events
                    .iter()
                    .filter(|e| !followed_only || e.is_followed)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, user_id: Uuid, event_id: i64, patch: EventPatch) -> Result<Event> {
        let mut users = self.users.write().await;
        let event = users
            .get_mut(&user_id)
            .and_then(|u| u.events.iter_mut().find(|e| e.id == event_id))
            .ok_or(EngineError::NotFound(event_id))?;
        patch.apply_to(event);
        Ok(event.clone())
    }

    async fn delete(&self, user_id: Uuid, event_id: i64) -> Result<bool> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = user.events.len();
        user.events.retain(|e| e.id != event_id);
        Ok(user.events.len() < before)
    }
}

// ============================================================================
// ScriptedCapability - Returns queued responses
// ============================================================================

/// Scripted language capability for testing
///
/// Each operation pops the next queued response for that operation; queue
/// errors to exercise the degradation paths. When a queue is empty a
/// deterministic fallback is returned, so tests only script what they
/// assert on.
#[derive(Debug, Default)]
pub struct ScriptedCapability {
    classifications: Mutex<VecDeque<Result<IntentClassification>>>,
    extractions: Mutex<VecDeque<Result<CreateExtraction>>>,
    update_patches: Mutex<VecDeque<Result<EventPatch>>>,
    matches: Mutex<VecDeque<Result<EventMatch>>>,
    summaries: Mutex<VecDeque<Result<String>>>,
    classify_log: Mutex<Vec<String>>,
    summarize_log: Mutex<Vec<Vec<i64>>>,
}

impl ScriptedCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_classification(&self, classification: IntentClassification) {
        self.classifications
            .lock()
            .await
            .push_back(Ok(classification));
    }

    pub async fn push_classification_error(&self, error: EngineError) {
        self.classifications.lock().await.push_back(Err(error));
    }

    pub async fn push_extraction(&self, extraction: CreateExtraction) {
        self.extractions.lock().await.push_back(Ok(extraction));
    }

    pub async fn push_extraction_error(&self, error: EngineError) {
        self.extractions.lock().await.push_back(Err(error));
    }

    pub async fn push_update_patch(&self, patch: EventPatch) {
        self.update_patches.lock().await.push_back(Ok(patch));
    }

    pub async fn push_match(&self, event_match: EventMatch) {
        self.matches.lock().await.push_back(Ok(event_match));
    }

    pub async fn push_summary(&self, summary: impl Into<String>) {
        self.summaries.lock().await.push_back(Ok(summary.into()));
    }

    /// Raw text of every turn passed to classify_intent
    pub async fn classified_turns(&self) -> Vec<String> {
        self.classify_log.lock().await.clone()
    }

    /// Event ids passed to each summarize_for_query call
    pub async fn summarized_event_ids(&self) -> Vec<Vec<i64>> {
        self.summarize_log.lock().await.clone()
    }
}

#[async_trait]
impl LanguageCapability for ScriptedCapability {
    async fn classify_intent(
        &self,
        turn: &ConversationTurn,
        _history: &[HistoryEntry],
    ) -> Result<IntentClassification> {
        self.classify_log.lock().await.push(turn.raw_text.clone());
        self.classifications
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| {
                Ok(IntentClassification::new(
                    Intent::Chat,
                    0.2,
                    "no scripted classification",
                ))
            })
    }

    async fn extract_create_fields(
        &self,
        _turn: &ConversationTurn,
        _history: &[HistoryEntry],
        _now: DateTime<Utc>,
    ) -> Result<CreateExtraction> {
        self.extractions.lock().await.pop_front().unwrap_or_else(|| {
            Ok(CreateExtraction {
                clarification_question: Some("Could you tell me a bit more?".into()),
                ..Default::default()
            })
        })
    }

    async fn extract_update_fields(
        &self,
        _original: &Event,
        _user_message: &str,
    ) -> Result<EventPatch> {
        self.update_patches
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(EventPatch::default()))
    }

    async fn match_referenced_event(
        &self,
        _candidates: &[Event],
        _history: &[HistoryEntry],
        _user_description: &str,
    ) -> Result<EventMatch> {
        self.matches
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(EventMatch::none("no scripted match")))
    }

    async fn summarize_for_query(
        &self,
        events: &[Event],
        _user_request: &str,
        _now: DateTime<Utc>,
    ) -> Result<String> {
        self.summarize_log
            .lock()
            .await
            .push(events.iter().map(|e| e.id).collect());
        self.summaries.lock().await.pop_front().unwrap_or_else(|| {
            let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
            Ok(format!(
                "You have {} event(s): {}",
                events.len(),
                titles.join(", ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;
    use chrono::TimeZone;

    fn new_event(title: &str, hour: u32) -> NewEvent {
        NewEvent {
            title: title.into(),
            start_time: Utc.with_ymd_and_hms(2026, 2, 5, hour, 0, 0).unwrap(),
            end_time: None,
            location: None,
            description: None,
            source_type: EventSource::Manual,
            is_followed: true,
            recurrence_rule: None,
            recurrence_end: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips_all_fields() {
        let store = InMemoryEventStore::new();
        let user = Uuid::now_v7();

        let created = store.create(user, new_event("Review", 14)).await.unwrap();
        let fetched = store.get(user, created.id).await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(created.id, 1);
    }

    #[tokio::test]
    async fn ids_are_scoped_per_user_and_never_reused() {
        let store = InMemoryEventStore::new();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();

        let a1 = store.create(alice, new_event("A1", 9)).await.unwrap();
        let b1 = store.create(bob, new_event("B1", 9)).await.unwrap();
        assert_eq!(a1.id, 1);
        assert_eq!(b1.id, 1);

        // Another user's id is NotFound, never leaked
        assert!(matches!(
            store.get(bob, a1.id + 1).await,
            Err(EngineError::NotFound(_))
        ));

        // Deleting does not free the id for reuse
        assert!(store.delete(alice, a1.id).await.unwrap());
        let a2 = store.create(alice, new_event("A2", 10)).await.unwrap();
        assert_eq!(a2.id, 2);
    }

    #[tokio::test]
    async fn update_touches_only_patched_fields() {
        let store = InMemoryEventStore::new();
        let user = Uuid::now_v7();
        let created = store.create(user, new_event("Review", 14)).await.unwrap();

        let updated = store
            .update(
                user,
                created.id,
                EventPatch {
                    title: Some("Q1 Review".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Q1 Review");
        assert_eq!(updated.start_time, created.start_time);
        assert_eq!(updated.end_time, created.end_time);
        assert_eq!(updated.is_followed, created.is_followed);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn delete_is_idempotent_observable() {
        let store = InMemoryEventStore::new();
        let user = Uuid::now_v7();
        let created = store.create(user, new_event("Review", 14)).await.unwrap();

        assert!(store.delete(user, created.id).await.unwrap());
        assert!(!store.delete(user, created.id).await.unwrap());
        assert!(!store.delete(Uuid::now_v7(), 1).await.unwrap());
    }

    #[tokio::test]
    async fn list_respects_followed_only() {
        let store = InMemoryEventStore::new();
        let user = Uuid::now_v7();
        let first = store.create(user, new_event("One", 9)).await.unwrap();
        let second = store.create(user, new_event("Two", 10)).await.unwrap();
        store
            .update(
                user,
                second.id,
                EventPatch {
                    is_followed: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let all = store.list(user, false).await.unwrap();
        assert_eq!(all.len(), 2);
        let followed = store.list(user, true).await.unwrap();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].id, first.id);
    }

    #[tokio::test]
    async fn scripted_capability_falls_back_to_defaults() {
        let capability = ScriptedCapability::new();
        let turn = ConversationTurn::text("hello");

        let classification = capability.classify_intent(&turn, &[]).await.unwrap();
        assert_eq!(classification.intent, Intent::Chat);

        let logged = capability.classified_turns().await;
        assert_eq!(logged, vec!["hello".to_string()]);
    }
}
