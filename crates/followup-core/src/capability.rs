// Typed request/response contracts for the language capability port
//
// The engine never sees prompt text or model output: every operation on the
// port answers with one of these shapes, or fails with
// CapabilityUnavailable/CapabilityMalformed.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::event::{EventDraft, EventField};

/// Classified purpose of a user turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Chat,
    CreateEvent,
    QueryEvent,
    UpdateEvent,
    DeleteEvent,
    EnrichEvent,
}

impl Intent {
    /// Intents that open or continue a slot-filling session
    pub fn is_slot_filling(&self) -> bool {
        matches!(self, Intent::CreateEvent | Intent::UpdateEvent)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Chat => write!(f, "chat"),
            Intent::CreateEvent => write!(f, "create_event"),
            Intent::QueryEvent => write!(f, "query_event"),
            Intent::UpdateEvent => write!(f, "update_event"),
            Intent::DeleteEvent => write!(f, "delete_event"),
            Intent::EnrichEvent => write!(f, "enrich_event"),
        }
    }
}

impl From<&str> for Intent {
    fn from(s: &str) -> Self {
        match s {
            "create_event" => Intent::CreateEvent,
            "query_event" => Intent::QueryEvent,
            "update_event" => Intent::UpdateEvent,
            "delete_event" => Intent::DeleteEvent,
            "enrich_event" => Intent::EnrichEvent,
            _ => Intent::Chat,
        }
    }
}

/// Result of classifying a user turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    /// Classifier confidence in [0, 1]
    pub confidence: f32,
    pub reason: String,
}

impl IntentClassification {
    pub fn new(intent: Intent, confidence: f32, reason: impl Into<String>) -> Self {
        Self {
            intent,
            confidence,
            reason: reason.into(),
        }
    }
}

/// Result of extracting creation fields from a turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateExtraction {
    /// Whether the capability believes enough information is present
    pub complete: bool,
    /// Fields explicitly supplied by the user in this turn
    pub fields: EventDraft,
    /// Required fields the capability found missing
    #[serde(default)]
    pub missing: Vec<EventField>,
    /// Question to ask the user when information is missing
    #[serde(default)]
    pub clarification_question: Option<String>,
    /// Keywords for a web-search fallback instead of asking the user
    #[serde(default)]
    pub search_keywords: Vec<String>,
}

/// Result of resolving which stored event a vague reference points to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMatch {
    /// Matched event id, or None when no candidate fits
    pub event_id: Option<i64>,
    /// Match confidence in [0, 1]
    pub confidence: f32,
    pub reason: String,
}

impl EventMatch {
    /// A non-match with zero confidence
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            event_id: None,
            confidence: 0.0,
            reason: reason.into(),
        }
    }
}
