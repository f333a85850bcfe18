// Event CRUD HTTP routes

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use followup_core::{EngineError, Event, EventPatch, EventSource, EventStore, NewEvent};

use crate::auth::AuthUser;
use crate::ics;
use crate::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:event_id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/:event_id/ics", get(event_ics))
        .with_state(state)
}

fn error_status(context: &str, error: EngineError) -> StatusCode {
    match error {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Validation(msg) => {
            tracing::debug!("{context}: validation failed: {msg}");
            StatusCode::BAD_REQUEST
        }
        other => {
            tracing::error!("{context}: {other}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    pub title: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub recurrence_end: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListEventsResponse {
    pub items: Vec<Event>,
    pub total: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListEventsParams {
    /// Only include events the user follows
    #[serde(default)]
    pub followed_only: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /events - List the user's events in insertion order
#[utoipa::path(
    get,
    path = "/api/events",
    params(ListEventsParams),
    responses(
        (status = 200, description = "The user's events", body = ListEventsResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListEventsParams>,
) -> Result<Json<ListEventsResponse>, StatusCode> {
    let items = state
        .store
        .list(user.id, params.followed_only)
        .await
        .map_err(|e| error_status("list events", e))?;

    Ok(Json(ListEventsResponse {
        total: items.len(),
        items,
    }))
}

/// POST /events - Create an event directly (no conversation involved)
#[utoipa::path(
    post,
    path = "/api/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid event fields"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), StatusCode> {
    let new_event = NewEvent {
        title: req.title,
        start_time: req.start_time,
        end_time: req.end_time,
        location: req.location,
        description: req.description,
        source_type: EventSource::Manual,
        is_followed: true,
        recurrence_rule: req.recurrence_rule,
        recurrence_end: req.recurrence_end,
    }
    .validated()
    .map_err(|e| error_status("create event", e))?;

    let event = state
        .store
        .create(user.id, new_event)
        .await
        .map_err(|e| error_status("create event", e))?;

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /events/{event_id} - Fetch one event
#[utoipa::path(
    get,
    path = "/api/events/{event_id}",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event found", body = Event),
        (status = 404, description = "Event not found"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<Json<Event>, StatusCode> {
    let event = state
        .store
        .get(user.id, event_id)
        .await
        .map_err(|e| error_status("get event", e))?;

    Ok(Json(event))
}

/// PUT /events/{event_id} - Patch the supplied fields
#[utoipa::path(
    put,
    path = "/api/events/{event_id}",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body = EventPatch,
    responses(
        (status = 200, description = "Event updated", body = Event),
        (status = 400, description = "Patch would make the event invalid"),
        (status = 404, description = "Event not found"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn update_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<i64>,
    Json(patch): Json<EventPatch>,
) -> Result<Json<Event>, StatusCode> {
    let current = state
        .store
        .get(user.id, event_id)
        .await
        .map_err(|e| error_status("update event", e))?;
    patch
        .validate_against(&current)
        .map_err(|e| error_status("update event", e))?;

    let event = state
        .store
        .update(user.id, event_id, patch)
        .await
        .map_err(|e| error_status("update event", e))?;

    Ok(Json(event))
}

/// DELETE /events/{event_id} - Delete one event
#[utoipa::path(
    delete,
    path = "/api/events/{event_id}",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let deleted = state
        .store
        .delete(user.id, event_id)
        .await
        .map_err(|e| error_status("delete event", e))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// GET /events/{event_id}/ics - iCalendar rendering of one event
#[utoipa::path(
    get,
    path = "/api/events/{event_id}/ics",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "text/calendar document", content_type = "text/calendar"),
        (status = 404, description = "Event not found"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn event_ics(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let event = state
        .store
        .get(user.id, event_id)
        .await
        .map_err(|e| error_status("event ics", e))?;

    let body = ics::render_event(&event);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"event.ics\"",
            ),
        ],
        body,
    ))
}
