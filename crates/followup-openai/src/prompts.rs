// Prompt builders for the capability operations
//
// Every structured operation ends with an explicit JSON contract so the
// reply can be parsed strictly; the summarize operation is the only one
// that returns prose.

use chrono::{DateTime, Utc};

use followup_core::HistoryEntry;

/// Render history as alternating speaker lines for prompt context
pub fn format_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "(no prior conversation)".to_string();
    }
    history
        .iter()
        .map(|entry| format!("{}: {}", entry.speaker, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn intent_classifier_system(now: DateTime<Utc>) -> String {
    format!(
        r#"You are an intent classifier for a smart calendar assistant. Analyze the user input and decide which category the user's intent belongs to:

1. chat - Greeting, small talk, or unclear intent that needs clarification
2. create_event - User wants to create a new event, activity, meeting, or appointment
3. query_event - User wants to view or understand their schedule
4. update_event - User wants to modify an existing event (time, location, title, ...)
5. delete_event - User wants to cancel or delete an existing event
6. enrich_event - User wants more detail or background added to an existing event

Principles:
- If the user uploads an image, assume it may describe an event (poster, invitation, screenshot); prefer create_event when it contains any time or activity information
- When the intent is uncertain, use chat with low confidence; never reject the user
- Mentions of "see", "view", "what's scheduled", "my events", "what's tomorrow" point to query_event
- Mentions of "change", "move", "postpone", "reschedule" about an existing event point to update_event
- Explicit "delete", "cancel", "not going" point to delete_event

Return only one JSON object in this format:
{{"intent": "intent_type", "confidence": 0.0-1.0, "reason": "brief explanation"}}

Current time: {now}"#,
        now = now.to_rfc3339()
    )
}

pub fn intent_classifier_user(message: &str, has_image: bool, history: &str) -> String {
    let image_note = if has_image {
        "\n(The user attached an image; it is included below.)"
    } else {
        ""
    };
    format!(
        "User message: {message}{image_note}\n\nConversation history:\n{history}\n\nAnalyze the user intent and return the JSON result."
    )
}

pub fn extraction_system(now: DateTime<Utc>) -> String {
    format!(
        r#"You are a smart calendar assistant. The user wants to create a new event; extract event information from the user input (text and any attached image).

Current time: {now}

Fields to extract:
- title: Event title (REQUIRED)
- start_time: Start time, ISO 8601 (REQUIRED)
- end_time: End time, ISO 8601 (optional)
- location: Location (optional)
- description: Description (optional)
- recurrence_rule: RRULE string if the event repeats (optional)
- recurrence_end: Recurrence end date, ISO 8601 (optional)

If a REQUIRED field is missing or ambiguous, ask the user for clarification. If the missing detail is something the public web would know better than the user (for example the date of a published concert or conference), return search keywords instead of a question.

Return JSON format:
{{
    "complete": true/false,
    "title": "..." or null,
    "start_time": "..." or null,
    "end_time": "..." or null,
    "location": "..." or null,
    "description": "..." or null,
    "recurrence_rule": "..." or null,
    "recurrence_end": "..." or null,
    "missing_info": ["missing required field names"],
    "clarification_question": "friendly question for the user" or null,
    "search_keywords": ["keywords for a web search"] or []
}}

Resolve relative dates ("tomorrow", "next Friday") against the current time above. Only include information the user actually provided; never invent a title or time."#,
        now = now.to_rfc3339()
    )
}

pub fn extraction_user(message: &str, has_image: bool, history: &str) -> String {
    let image_note = if has_image {
        "\n(The user attached an image; it is included below.)"
    } else {
        ""
    };
    format!("User input: {message}{image_note}\n\nConversation history:\n{history}")
}

pub fn update_system(original_event: &str, user_message: &str) -> String {
    format!(
        r#"You are a smart calendar assistant. The user wants to update an existing event; extract the fields to be modified from the user's request.

Original event:
{original_event}

User's update request:
{user_message}

Return only the fields the user explicitly wants to change, as a JSON object:
{{"title": "...", "start_time": "...", "end_time": "...", "location": "...", "description": "..."}}

Times are ISO 8601. Omit every field the user did not mention."#
    )
}

pub fn match_system(events_list: &str, history: &str, user_description: &str) -> String {
    format!(
        r#"You are a smart calendar assistant. The user is referring to one of their existing events; find the best match for their description.

Read the conversation history carefully: the current message may be a response to something the assistant said earlier, so the target event may only be identifiable from context.

Existing events (JSON):
{events_list}

Conversation history:
{history}

User's current message:
{user_description}

Return JSON format:
{{"matched_event_id": event id or null, "confidence": 0.0-1.0, "reason": "how the target was identified"}}

If no event matches, return null for matched_event_id."#
    )
}

pub fn query_system(now: DateTime<Utc>, user_request: &str, events_list: &str) -> String {
    format!(
        r#"You are a smart calendar assistant. The user wants to view their schedule.

Current time: {now}

User request: {user_request}

The user's events (JSON):
{events_list}

Summarize the events for the user:
- Show date, time, title, and location in a clear format, sorted by time
- If no events match, say so in a friendly way
- Keep the answer concise and friendly"#,
        now = now.to_rfc3339()
    )
}
