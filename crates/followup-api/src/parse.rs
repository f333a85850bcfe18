// Schedule-parse endpoint
//
// Turns a pasted block of text or an uploaded image into a calendar event by
// driving the engine as a create-intent conversation. When required fields
// are missing, the clarification reply comes back with a parse_id the client
// resends to continue filling the same session.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use followup_core::{ConversationTurn, EngineAction, Event, EventStore};

use crate::auth::AuthUser;
use crate::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/parse", post(parse_schedule))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ParseRequest {
    /// "text" or "image"
    pub input_type: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub additional_note: Option<String>,
    /// Returned by a previous incomplete parse; continues that session
    #[serde(default)]
    pub parse_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ParseResponse {
    pub parse_id: Uuid,
    /// True when an event was created from this input
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
    pub reply: String,
}

/// POST /parse - Extract an event from raw text or an image
#[utoipa::path(
    post,
    path = "/api/parse",
    request_body = ParseRequest,
    responses(
        (status = 200, description = "Parse outcome; complete=false carries a clarification", body = ParseResponse),
        (status = 400, description = "Missing input for the declared input_type"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = [])),
    tag = "parse"
)]
pub async fn parse_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, StatusCode> {
    let mut text = match req.input_type.as_str() {
        "text" => req.text_content.ok_or(StatusCode::BAD_REQUEST)?,
        "image" => {
            if req.image_ref.is_none() {
                return Err(StatusCode::BAD_REQUEST);
            }
            req.text_content.unwrap_or_default()
        }
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    if let Some(note) = req.additional_note {
        if !note.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&note);
        }
    }

    let parse_id = req.parse_id.unwrap_or_else(Uuid::now_v7);
    let mut turn = ConversationTurn {
        raw_text: format!("Please add this to my calendar: {text}"),
        image_ref: None,
        timestamp: Utc::now(),
    };
    if let Some(image_ref) = req.image_ref {
        turn = turn.with_image(image_ref);
    }

    let outcome = state
        .engine
        .handle_turn(user.id, parse_id, turn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to handle parse turn: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let event = match outcome.action {
        Some(EngineAction::EventCreated { event_id }) => state
            .store
            .get(user.id, event_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load created event: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })
            .map(Some)?,
        _ => None,
    };

    Ok(Json(ParseResponse {
        parse_id,
        complete: event.is_some(),
        event,
        reply: outcome.reply,
    }))
}
