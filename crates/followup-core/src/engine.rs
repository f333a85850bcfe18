// Intent resolution engine
//
// IntentEngine is the top-level orchestrator: it receives a turn, consults
// the language capability for intent, routes to the right handler
// (create/query/update/delete/enrich/chat), and returns a structured action
// plus a user-facing reply. Every branch produces a defined reply; no
// capability failure escapes as a fault.
//
// Turns for the same user+conversation are serialized behind a
// per-conversation mutex because slot-filling merges are not commutative
// across out-of-order turns. Different conversations run fully in parallel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::capability::{Intent, IntentClassification};
use crate::config::EngineConfig;
use crate::conflict::{find_overlaps, Interval};
use crate::error::{EngineError, Result};
use crate::event::{Event, NewEvent};
use crate::session::{SessionKind, SessionStep, SlotSession};
use crate::timeframe::infer_time_range;
use crate::traits::{EventStore, LanguageCapability};
use crate::turn::{ConversationTurn, History, HistoryEntry, Speaker};

/// Structured side effect of a handled turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineAction {
    EventCreated { event_id: i64 },
    EventUpdated { event_id: i64 },
    EventDeleted { event_id: i64 },
    /// The assistant asked for missing event information
    Clarification,
    /// The assistant asked which event was meant
    Disambiguation,
    /// Delegate to the web-search collaborator; its result re-enters as a
    /// new turn
    Search { keywords: Vec<String> },
}

/// Reply and optional action for one handled turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TurnOutcome {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<EngineAction>,
}

impl TurnOutcome {
    fn reply_only(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            action: None,
        }
    }

    fn with_action(reply: impl Into<String>, action: EngineAction) -> Self {
        Self {
            reply: reply.into(),
            action: Some(action),
        }
    }
}

/// Per-conversation state: bounded history plus at most one slot session
struct Conversation {
    history: History,
    session: Option<SlotSession>,
}

impl Conversation {
    fn new(history_window: usize) -> Self {
        Self {
            history: History::with_capacity(history_window),
            session: None,
        }
    }
}

/// Map entry for one conversation; `last_activity` lives beside the Arc so
/// eviction never has to take the conversation lock
struct ConversationSlot {
    conversation: Arc<Mutex<Conversation>>,
    last_activity: DateTime<Utc>,
}

/// Top-level conversational engine, generic over its two ports
pub struct IntentEngine<S, C>
where
    S: EventStore,
    C: LanguageCapability,
{
    store: Arc<S>,
    capability: Arc<C>,
    config: EngineConfig,
    conversations: RwLock<HashMap<(Uuid, Uuid), ConversationSlot>>,
}

impl<S, C> IntentEngine<S, C>
where
    S: EventStore,
    C: LanguageCapability,
{
    /// Create a new engine over the given store and capability
    pub fn new(store: Arc<S>, capability: Arc<C>, config: EngineConfig) -> Self {
        Self {
            store,
            capability,
            config,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Reference to the underlying event store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handle one user turn within a conversation
    ///
    /// Turns for the same conversation queue behind each other; only storage
    /// faults propagate as errors.
    pub async fn handle_turn(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        turn: ConversationTurn,
    ) -> Result<TurnOutcome> {
        let conversation = self
            .conversation_handle(user_id, conversation_id, turn.timestamp)
            .await;
        let mut conversation = conversation.lock().await;
        let now = turn.timestamp;

        // Session expiry is independent of anything in flight
        if let Some(session) = &conversation.session {
            if session.expired(now, self.config.session_idle_timeout) {
                tracing::debug!(%user_id, %conversation_id, "slot session expired, discarding");
                conversation.session = None;
            }
        }

        let history = conversation.history.entries();
        let classification = self
            .bounded(self.capability.classify_intent(&turn, &history))
            .await;

        let outcome = self
            .route(user_id, &mut conversation, &turn, &history, classification, now)
            .await?;

        conversation
            .history
            .push(Speaker::User, turn.raw_text.clone(), now);
        conversation
            .history
            .push(Speaker::Assistant, outcome.reply.clone(), now);

        Ok(outcome)
    }

    /// True when a slot session is active for the conversation
    pub async fn has_active_session(&self, user_id: Uuid, conversation_id: Uuid) -> bool {
        let conversations = self.conversations.read().await;
        match conversations.get(&(user_id, conversation_id)) {
            Some(slot) => slot.conversation.lock().await.session.is_some(),
            None => false,
        }
    }

    /// Number of conversations currently held in memory
    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }

    /// Fetch or create the conversation, evicting entries idle past the
    /// conversation timeout so the map tracks live traffic instead of every
    /// conversation id ever seen
    async fn conversation_handle(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Arc<Mutex<Conversation>> {
        let mut conversations = self.conversations.write().await;
        conversations
            .retain(|_, slot| now - slot.last_activity <= self.config.conversation_idle_timeout);

        let slot = conversations
            .entry((user_id, conversation_id))
            .or_insert_with(|| ConversationSlot {
                conversation: Arc::new(Mutex::new(Conversation::new(self.config.history_window))),
                last_activity: now,
            });
        slot.last_activity = now;
        slot.conversation.clone()
    }

    /// Apply the capability timeout; elapsed maps to CapabilityUnavailable
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.capability_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::unavailable("capability call timed out")),
        }
    }

    async fn route(
        &self,
        user_id: Uuid,
        conversation: &mut Conversation,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
        classification: Result<IntentClassification>,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome> {
        if conversation.session.is_some() {
            // An active session owns the turn unless a different-family
            // intent arrives at high confidence
            let takeover = match &classification {
                Ok(c) => {
                    c.confidence >= self.config.takeover_confidence
                        && !same_family(&conversation.session, c.intent)
                }
                Err(_) => false,
            };

            if !takeover {
                return self
                    .continue_session(user_id, conversation, turn, history, now)
                    .await;
            }

            // The classifier pointed elsewhere; two such turns in a row
            // abandon the session with no writes
            if let Some(session) = &mut conversation.session {
                if session.note_unrelated(now) {
                    tracing::debug!(%user_id, "slot session abandoned after repeated unrelated turns");
                    conversation.session = None;
                }
            }

            // A genuinely new create/update request needs the session slot
            if let Ok(c) = &classification {
                if c.intent.is_slot_filling() {
                    conversation.session = None;
                }
            }
        }

        let classification = match classification {
            Ok(classification) => classification,
            Err(error) => {
                tracing::warn!(%user_id, %error, "intent classification failed, defaulting to chat");
                return Ok(TurnOutcome::reply_only(APOLOGY_REPLY));
            }
        };
        tracing::debug!(
            %user_id,
            intent = %classification.intent,
            confidence = classification.confidence,
            "turn classified"
        );

        match classification.intent {
            Intent::CreateEvent => {
                if conversation.session.is_none() {
                    conversation.session = Some(SlotSession::create(turn.origin(), now));
                }
                self.continue_session(user_id, conversation, turn, history, now)
                    .await
            }
            Intent::UpdateEvent => {
                if conversation.session.is_none() {
                    conversation.session = Some(SlotSession::update(None, turn.origin(), now));
                }
                self.continue_session(user_id, conversation, turn, history, now)
                    .await
            }
            Intent::QueryEvent => self.handle_query(user_id, turn, now).await,
            Intent::DeleteEvent => self.handle_delete(user_id, turn, history).await,
            Intent::EnrichEvent => self.handle_enrich(user_id, turn, history).await,
            Intent::Chat => Ok(TurnOutcome::reply_only(CHAT_REPLY)),
        }
    }

    async fn continue_session(
        &self,
        user_id: Uuid,
        conversation: &mut Conversation,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome> {
        let kind = match &conversation.session {
            Some(session) => session.kind,
            // Routing only reaches here with a session in place
            None => return Ok(TurnOutcome::reply_only(CHAT_REPLY)),
        };

        match kind {
            SessionKind::Create => {
                self.continue_create(user_id, conversation, turn, history, now)
                    .await
            }
            SessionKind::Update { .. } => {
                self.continue_update(user_id, conversation, turn, history, now)
                    .await
            }
        }
    }

    async fn continue_create(
        &self,
        user_id: Uuid,
        conversation: &mut Conversation,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome> {
        let extraction = match self
            .bounded(self.capability.extract_create_fields(turn, history, now))
            .await
        {
            Ok(extraction) => extraction,
            Err(error) => {
                tracing::warn!(%user_id, %error, "field extraction failed");
                if let Some(session) = &mut conversation.session {
                    session.touch(now);
                }
                return Ok(TurnOutcome::reply_only(APOLOGY_REPLY));
            }
        };

        let Some(session) = &mut conversation.session else {
            return Ok(TurnOutcome::reply_only(CHAT_REPLY));
        };

        match session.absorb(&extraction, now, self.config.max_stalled_turns) {
            SessionStep::Complete => {
                let draft = session.collected.clone();
                let origin = session.origin;
                let new_event =
                    match NewEvent::from_draft(draft, origin, self.config.default_event_duration) {
                        Ok(new_event) => new_event,
                        Err(EngineError::Validation(message)) => {
                            // The merged draft is inconsistent (end before
                            // start); drop the end time and ask again rather
                            // than committing or looping
                            session.collected.end_time = None;
                            return Ok(TurnOutcome::with_action(
                                format!("{message}. When should it end?"),
                                EngineAction::Clarification,
                            ));
                        }
                        Err(error) => return Err(error),
                    };

                let existing = self.store.list(user_id, false).await?;
                let candidate = Interval::new(new_event.start_time, new_event.end_time);
                let conflicts: Vec<String> =
                    find_overlaps(&existing, candidate, None, self.config.open_event_duration)
                        .into_iter()
                        .map(|event| event.title.clone())
                        .collect();

                let created = self.store.create(user_id, new_event).await?;
                conversation.session = None;

                let mut reply = format!(
                    "Added \"{}\" on {}.",
                    created.title,
                    created.start_time.format("%Y-%m-%d at %H:%M")
                );
                if !conflicts.is_empty() {
                    reply.push_str(&format!(
                        " Heads up: \"{}\" overlaps with {}.",
                        created.title,
                        join_quoted(&conflicts)
                    ));
                }
                Ok(TurnOutcome::with_action(
                    reply,
                    EngineAction::EventCreated {
                        event_id: created.id,
                    },
                ))
            }
            SessionStep::Search { keywords } => Ok(TurnOutcome::with_action(
                format!(
                    "Let me look up the details for \"{}\" and get back to you.",
                    keywords.join(" ")
                ),
                EngineAction::Search { keywords },
            )),
            SessionStep::Clarify { question } => {
                let reply = question.unwrap_or_else(|| {
                    let missing: Vec<String> =
                        session.missing.iter().map(|f| f.to_string()).collect();
                    format!(
                        "I still need the {} to add this event.",
                        missing.join(" and ")
                    )
                });
                Ok(TurnOutcome::with_action(reply, EngineAction::Clarification))
            }
            SessionStep::Stalled => {
                tracing::debug!(%user_id, "slot session stalled, abandoning");
                conversation.session = None;
                Ok(TurnOutcome::reply_only(
                    "I wasn't able to pin down the details. Let's start over — \
                     what would you like to schedule?",
                ))
            }
        }
    }

    async fn continue_update(
        &self,
        user_id: Uuid,
        conversation: &mut Conversation,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome> {
        // Resolve the target first; the session keeps collecting until a
        // reference resolves with enough confidence
        let target = conversation.session.as_ref().and_then(|s| s.target());
        let target = match target {
            Some(target) => target,
            None => {
                let candidates = self.store.list(user_id, false).await?;
                if candidates.is_empty() {
                    conversation.session = None;
                    return Ok(TurnOutcome::reply_only(
                        "You don't have any events yet, so there's nothing to change.",
                    ));
                }

                let matched = match self
                    .bounded(self.capability.match_referenced_event(
                        &candidates,
                        history,
                        &turn.raw_text,
                    ))
                    .await
                {
                    Ok(matched) => matched,
                    Err(error) => {
                        tracing::warn!(%user_id, %error, "event match failed");
                        if let Some(session) = &mut conversation.session {
                            session.touch(now);
                        }
                        return Ok(TurnOutcome::reply_only(APOLOGY_REPLY));
                    }
                };

                match matched.event_id {
                    Some(event_id)
                        if matched.confidence >= self.config.match_confidence_threshold =>
                    {
                        if let Some(session) = &mut conversation.session {
                            session.set_target(event_id);
                            session.touch(now);
                        }
                        event_id
                    }
                    _ => {
                        if let Some(session) = &mut conversation.session {
                            session.touch(now);
                        }
                        return Ok(TurnOutcome::with_action(
                            disambiguation_reply(&candidates),
                            EngineAction::Disambiguation,
                        ));
                    }
                }
            }
        };

        let original = match self.store.get(user_id, target).await {
            Ok(original) => original,
            Err(EngineError::NotFound(_)) => {
                conversation.session = None;
                return Ok(TurnOutcome::reply_only(NOT_FOUND_REPLY));
            }
            Err(error) => return Err(error),
        };

        let patch = match self
            .bounded(
                self.capability
                    .extract_update_fields(&original, &turn.raw_text),
            )
            .await
        {
            Ok(patch) => patch,
            Err(error) => {
                tracing::warn!(%user_id, %error, "update extraction failed");
                if let Some(session) = &mut conversation.session {
                    session.touch(now);
                }
                return Ok(TurnOutcome::reply_only(APOLOGY_REPLY));
            }
        };

        if patch.is_empty() {
            if let Some(session) = &mut conversation.session {
                session.touch(now);
            }
            return Ok(TurnOutcome::with_action(
                format!(
                    "What would you like to change about \"{}\"?",
                    original.title
                ),
                EngineAction::Clarification,
            ));
        }

        if let Err(EngineError::Validation(message)) = patch.validate_against(&original) {
            if let Some(session) = &mut conversation.session {
                session.touch(now);
            }
            return Ok(TurnOutcome::with_action(
                format!("{message}. Could you give me the new times again?"),
                EngineAction::Clarification,
            ));
        }

        let times_changed = patch.start_time.is_some() || patch.end_time.is_some();
        let updated = self.store.update(user_id, target, patch).await?;
        conversation.session = None;

        let mut reply = format!("Done — I've updated \"{}\".", updated.title);
        if times_changed {
            // The event moved; warn about new overlaps, excluding itself
            let existing = self.store.list(user_id, false).await?;
            let moved = Interval::new(updated.start_time, updated.end_time);
            let conflicts: Vec<String> = find_overlaps(
                &existing,
                moved,
                Some(updated.id),
                self.config.open_event_duration,
            )
            .into_iter()
            .map(|event| event.title.clone())
            .collect();
            if !conflicts.is_empty() {
                reply.push_str(&format!(
                    " Heads up: it now overlaps with {}.",
                    join_quoted(&conflicts)
                ));
            }
        }
        Ok(TurnOutcome::with_action(
            reply,
            EngineAction::EventUpdated {
                event_id: updated.id,
            },
        ))
    }

    async fn handle_query(
        &self,
        user_id: Uuid,
        turn: &ConversationTurn,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome> {
        let events = self.store.list(user_id, false).await?;
        let range = infer_time_range(&turn.raw_text, now);
        let in_range: Vec<Event> = events
            .into_iter()
            .filter(|event| match &range {
                Some(range) => range.contains(event.start_time),
                None => true,
            })
            .collect();

        match self
            .bounded(
                self.capability
                    .summarize_for_query(&in_range, &turn.raw_text, now),
            )
            .await
        {
            Ok(summary) => Ok(TurnOutcome::reply_only(summary)),
            Err(error) => {
                tracing::warn!(%user_id, %error, "query summarization failed");
                Ok(TurnOutcome::reply_only(APOLOGY_REPLY))
            }
        }
    }

    async fn handle_delete(
        &self,
        user_id: Uuid,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
    ) -> Result<TurnOutcome> {
        let candidates = self.store.list(user_id, false).await?;
        if candidates.is_empty() {
            return Ok(TurnOutcome::reply_only(
                "You don't have any events yet, so there's nothing to cancel.",
            ));
        }

        let matched = match self
            .bounded(self.capability.match_referenced_event(
                &candidates,
                history,
                &turn.raw_text,
            ))
            .await
        {
            Ok(matched) => matched,
            Err(error) => {
                tracing::warn!(%user_id, %error, "event match failed");
                return Ok(TurnOutcome::reply_only(APOLOGY_REPLY));
            }
        };

        let event_id = match matched.event_id {
            Some(event_id) if matched.confidence >= self.config.match_confidence_threshold => {
                event_id
            }
            _ => {
                return Ok(TurnOutcome::with_action(
                    disambiguation_reply(&candidates),
                    EngineAction::Disambiguation,
                ))
            }
        };

        let event = match self.store.get(user_id, event_id).await {
            Ok(event) => event,
            Err(EngineError::NotFound(_)) => return Ok(TurnOutcome::reply_only(NOT_FOUND_REPLY)),
            Err(error) => return Err(error),
        };

        if self.store.delete(user_id, event_id).await? {
            Ok(TurnOutcome::with_action(
                format!("I've cancelled \"{}\".", event.title),
                EngineAction::EventDeleted { event_id },
            ))
        } else {
            Ok(TurnOutcome::reply_only(NOT_FOUND_REPLY))
        }
    }

    async fn handle_enrich(
        &self,
        user_id: Uuid,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
    ) -> Result<TurnOutcome> {
        let candidates = self.store.list(user_id, false).await?;
        if candidates.is_empty() {
            return Ok(TurnOutcome::reply_only(
                "You don't have any events yet — add one first and I can look up more about it.",
            ));
        }

        let matched = match self
            .bounded(self.capability.match_referenced_event(
                &candidates,
                history,
                &turn.raw_text,
            ))
            .await
        {
            Ok(matched) => matched,
            Err(error) => {
                tracing::warn!(%user_id, %error, "event match failed");
                return Ok(TurnOutcome::reply_only(APOLOGY_REPLY));
            }
        };

        match matched.event_id {
            Some(event_id) if matched.confidence >= self.config.match_confidence_threshold => {
                let event = match self.store.get(user_id, event_id).await {
                    Ok(event) => event,
                    Err(EngineError::NotFound(_)) => {
                        return Ok(TurnOutcome::reply_only(NOT_FOUND_REPLY))
                    }
                    Err(error) => return Err(error),
                };
                Ok(TurnOutcome::reply_only(format!(
                    "Looking up extra details for \"{}\" isn't supported yet, \
                     but it's on the way.",
                    event.title
                )))
            }
            _ => Ok(TurnOutcome::with_action(
                disambiguation_reply(&candidates),
                EngineAction::Disambiguation,
            )),
        }
    }
}

/// Whether the classified intent belongs to the active session's family
fn same_family(session: &Option<SlotSession>, intent: Intent) -> bool {
    match session {
        Some(session) => matches!(
            (session.kind, intent),
            (SessionKind::Create, Intent::CreateEvent)
                | (SessionKind::Update { .. }, Intent::UpdateEvent)
        ),
        None => false,
    }
}

fn disambiguation_reply(candidates: &[Event]) -> String {
    let titles: Vec<String> = candidates.iter().map(|e| e.title.clone()).collect();
    format!(
        "I'm not sure which event you mean. Your events are: {}. Which one is it?",
        join_quoted(&titles)
    )
}

fn join_quoted(titles: &[String]) -> String {
    titles
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

const CHAT_REPLY: &str = "Hi! I'm FollowUp, your calendar assistant. I can add events, \
     look up your schedule, or change and cancel existing plans — just tell me what you need.";

const APOLOGY_REPLY: &str = "Sorry, I'm having trouble understanding right now. \
     Could you try that again in a moment?";

const NOT_FOUND_REPLY: &str = "I couldn't find that event — it may have been removed already.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Intent;
    use crate::event::EventSource;
    use crate::session::SlotSession;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 5, 9, 0, 0).unwrap()
    }

    #[test]
    fn same_family_matches_session_kind() {
        let create = Some(SlotSession::create(EventSource::Text, ts()));
        assert!(same_family(&create, Intent::CreateEvent));
        assert!(!same_family(&create, Intent::UpdateEvent));
        assert!(!same_family(&create, Intent::Chat));

        let update = Some(SlotSession::update(Some(1), EventSource::Text, ts()));
        assert!(same_family(&update, Intent::UpdateEvent));
        assert!(!same_family(&update, Intent::CreateEvent));

        assert!(!same_family(&None, Intent::CreateEvent));
    }

    #[test]
    fn quoted_join_reads_naturally() {
        let titles = vec!["Dinner".to_string(), "Standup".to_string()];
        assert_eq!(join_quoted(&titles), "\"Dinner\", \"Standup\"");
    }
}
