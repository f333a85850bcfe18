// Conversational assistant endpoint
//
// One POST per user turn; the engine serializes turns within a conversation
// and always produces a reply, so only storage faults surface as 500s.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use followup_core::{ConversationTurn, EngineAction, TurnOutcome};

use crate::auth::AuthUser;
use crate::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/assistant/messages", post(post_message))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssistantMessageRequest {
    /// Omit to start a new conversation
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub message: String,
    #[serde(default)]
    pub image_ref: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssistantMessageResponse {
    pub conversation_id: Uuid,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<EngineAction>,
}

/// POST /assistant/messages - Send one turn to the assistant
#[utoipa::path(
    post,
    path = "/api/assistant/messages",
    request_body = AssistantMessageRequest,
    responses(
        (status = 200, description = "Assistant reply", body = AssistantMessageResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = [])),
    tag = "assistant"
)]
pub async fn post_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AssistantMessageRequest>,
) -> Result<Json<AssistantMessageResponse>, StatusCode> {
    let conversation_id = req.conversation_id.unwrap_or_else(Uuid::now_v7);

    let mut turn = ConversationTurn {
        raw_text: req.message,
        image_ref: None,
        timestamp: Utc::now(),
    };
    if let Some(image_ref) = req.image_ref {
        turn = turn.with_image(image_ref);
    }

    let TurnOutcome { reply, action } = state
        .engine
        .handle_turn(user.id, conversation_id, turn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to handle assistant turn: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(AssistantMessageResponse {
        conversation_id,
        reply,
        action,
    }))
}
