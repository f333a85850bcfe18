// OpenAI Capability Implementation
//
// Implements the LanguageCapability trait from followup-core over the chat
// completions API. Transport failures map to CapabilityUnavailable and
// unparseable replies map to CapabilityMalformed, so the engine can degrade
// without knowing which provider sits behind the port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use followup_core::{
    ConversationTurn, CreateExtraction, EngineError, Event, EventDraft, EventMatch, EventPatch,
    HistoryEntry, Intent, IntentClassification, LanguageCapability, Result,
};

use crate::prompts;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, MessageContent};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Low temperature keeps the JSON contracts stable across retries
const TEMPERATURE: f32 = 0.1;

/// OpenAI-backed language capability
pub struct OpenAiCapability {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl OpenAiCapability {
    /// Create a capability from the environment
    ///
    /// Requires OPENAI_API_KEY; OPENAI_MODEL overrides the default model.
    pub fn new() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self {
            client: Client::new(),
            api_key,
            model,
            api_url: DEFAULT_API_URL.to_string(),
        })
    }

    /// Create a capability with an explicit API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a compatible endpoint (proxies, self-hosted gateways)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// One non-streaming completion; returns the assistant text
    async fn complete(&self, system: String, user: MessageContent) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: Some(TEMPERATURE),
            max_tokens: None,
            stream: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "chat completion request rejected");
            return Err(EngineError::unavailable(format!(
                "completion request failed with status {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::malformed(format!("unparseable completion body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EngineError::malformed("completion contained no content"))
    }

    /// Complete and parse a JSON reply, tolerating markdown code fences
    async fn complete_json<T: DeserializeOwned>(
        &self,
        system: String,
        user: MessageContent,
    ) -> Result<T> {
        let text = self.complete(system, user).await?;
        serde_json::from_str(strip_code_fences(&text))
            .map_err(|e| EngineError::malformed(format!("invalid JSON reply: {e}: {text}")))
    }
}

#[async_trait]
impl LanguageCapability for OpenAiCapability {
    async fn classify_intent(
        &self,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
    ) -> Result<IntentClassification> {
        let system = prompts::intent_classifier_system(turn.timestamp);
        let user = prompts::intent_classifier_user(
            &turn.raw_text,
            turn.image_ref.is_some(),
            &prompts::format_history(history),
        );
        let wire: WireClassification = self
            .complete_json(system, MessageContent::with_image(user, turn.image_ref.as_deref()))
            .await?;

        Ok(IntentClassification::new(
            Intent::from(wire.intent.as_str()),
            wire.confidence.clamp(0.0, 1.0),
            wire.reason,
        ))
    }

    async fn extract_create_fields(
        &self,
        turn: &ConversationTurn,
        history: &[HistoryEntry],
        now: DateTime<Utc>,
    ) -> Result<CreateExtraction> {
        let system = prompts::extraction_system(now);
        let user = prompts::extraction_user(
            &turn.raw_text,
            turn.image_ref.is_some(),
            &prompts::format_history(history),
        );
        let wire: WireExtraction = self
            .complete_json(system, MessageContent::with_image(user, turn.image_ref.as_deref()))
            .await?;

        let fields = EventDraft {
            title: non_blank(wire.title),
            start_time: parse_timestamp(wire.start_time),
            end_time: parse_timestamp(wire.end_time),
            location: non_blank(wire.location),
            description: non_blank(wire.description),
            recurrence_rule: non_blank(wire.recurrence_rule),
            recurrence_end: parse_timestamp(wire.recurrence_end),
        };
        let missing = fields.missing_required();

        Ok(CreateExtraction {
            complete: wire.complete && missing.is_empty(),
            fields,
            missing,
            clarification_question: non_blank(wire.clarification_question),
            search_keywords: wire.search_keywords,
        })
    }

    async fn extract_update_fields(
        &self,
        original: &Event,
        user_message: &str,
    ) -> Result<EventPatch> {
        let original_json = serde_json::to_string_pretty(original)
            .map_err(|e| EngineError::malformed(format!("event not serializable: {e}")))?;
        let system = prompts::update_system(&original_json, user_message);
        self.complete_json(system, MessageContent::Text("Return the JSON object.".into()))
            .await
    }

    async fn match_referenced_event(
        &self,
        candidates: &[Event],
        history: &[HistoryEntry],
        user_description: &str,
    ) -> Result<EventMatch> {
        let events_json = serde_json::to_string_pretty(candidates)
            .map_err(|e| EngineError::malformed(format!("events not serializable: {e}")))?;
        let system = prompts::match_system(
            &events_json,
            &prompts::format_history(history),
            user_description,
        );
        let wire: WireMatch = self
            .complete_json(system, MessageContent::Text("Return the JSON object.".into()))
            .await?;

        Ok(EventMatch {
            event_id: wire.matched_event_id,
            confidence: wire.confidence.clamp(0.0, 1.0),
            reason: wire.reason,
        })
    }

    async fn summarize_for_query(
        &self,
        events: &[Event],
        user_request: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let events_json = serde_json::to_string_pretty(events)
            .map_err(|e| EngineError::malformed(format!("events not serializable: {e}")))?;
        let system = prompts::query_system(now, user_request, &events_json);
        let text = self
            .complete(system, MessageContent::Text("Summarize my schedule.".into()))
            .await?;
        Ok(text.trim().to_string())
    }
}

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireClassification {
    intent: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct WireExtraction {
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    recurrence_rule: Option<String>,
    #[serde(default)]
    recurrence_end: Option<String>,
    #[serde(default)]
    clarification_question: Option<String>,
    #[serde(default)]
    search_keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    #[serde(default)]
    matched_event_id: Option<i64>,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reason: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Strip a surrounding markdown code fence, if present
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Lenient ISO 8601 parse; unparseable values count as absent so the
/// slot-filling loop asks again instead of failing the turn
fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn timestamps_parse_leniently() {
        assert_eq!(
            parse_timestamp(Some("2026-02-05T19:00:00Z".into()))
                .map(|dt| dt.to_rfc3339()),
            Some("2026-02-05T19:00:00+00:00".into())
        );
        assert_eq!(parse_timestamp(Some("next tuesday".into())), None);
        assert_eq!(parse_timestamp(None), None);
    }

    #[test]
    fn extraction_wire_tolerates_nulls_and_missing_keys() {
        let wire: WireExtraction = serde_json::from_str(
            r#"{"complete": false, "title": "Dinner", "start_time": null, "missing_info": ["start_time"], "clarification_question": "What time?"}"#,
        )
        .unwrap();
        assert_eq!(wire.title.as_deref(), Some("Dinner"));
        assert!(wire.start_time.is_none());
        assert!(wire.search_keywords.is_empty());
    }

    #[test]
    fn match_wire_accepts_null_id() {
        let wire: WireMatch = serde_json::from_str(
            r#"{"matched_event_id": null, "confidence": 0.1, "reason": "nothing fits"}"#,
        )
        .unwrap();
        assert!(wire.matched_event_id.is_none());
    }
}
