// FollowUp API server
// Decision: the engine is constructed once at startup over the Postgres
// store and the OpenAI capability; conversations live in engine memory

mod assistant;
mod auth;
mod events;
mod ics;
mod parse;
mod seed;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use followup_core::{
    EngineAction, EngineConfig, Event, EventPatch, EventSource, IntentEngine, TurnOutcome,
};
use followup_openai::OpenAiCapability;
use followup_storage::{Database, PgEventStore};

/// The concrete engine this binary serves
pub type Engine = IntentEngine<PgEventStore, OpenAiCapability>;

/// App state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub store: Arc<PgEventStore>,
    pub engine: Arc<Engine>,
    pub jwt: Arc<auth::JwtKeys>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::me,
        events::list_events,
        events::create_event,
        events::get_event,
        events::update_event,
        events::delete_event,
        events::event_ics,
        assistant::post_message,
        parse::parse_schedule,
    ),
    components(
        schemas(
            Event, EventSource, EventPatch, TurnOutcome, EngineAction,
            auth::LoginRequest, auth::LoginResponse, auth::UserProfile,
            events::CreateEventRequest, events::ListEventsResponse,
            assistant::AssistantMessageRequest, assistant::AssistantMessageResponse,
            parse::ParseRequest, parse::ParseResponse,
        )
    ),
    tags(
        (name = "auth", description = "Login and profile endpoints"),
        (name = "events", description = "Calendar event endpoints"),
        (name = "assistant", description = "Conversational assistant endpoint"),
        (name = "parse", description = "Schedule parsing endpoint")
    ),
    info(
        title = "FollowUp API",
        version = "0.1.0",
        description = "Conversational calendar backend",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "followup_api=debug,followup_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("followup-api starting...");

    // Initialize database
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let db = Database::from_url(&database_url)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Connected to database");

    let db = Arc::new(db);
    let store = Arc::new(PgEventStore::new((*db).clone()));

    // Dev-only sample data
    if std::env::var("FOLLOWUP_SEED_DEMO").is_ok_and(|v| v == "1" || v == "true") {
        seed::seed_demo_data(&db, &store)
            .await
            .context("Failed to seed demo data")?;
    }

    // Language capability (requires OPENAI_API_KEY)
    let capability = Arc::new(OpenAiCapability::new().context("Failed to create capability")?);

    let engine = Arc::new(Engine::new(
        store.clone(),
        capability,
        EngineConfig::default(),
    ));

    let jwt_secret = std::env::var("FOLLOWUP_JWT_SECRET")
        .context("FOLLOWUP_JWT_SECRET environment variable required")?;

    let state = AppState {
        db,
        store,
        engine,
        jwt: Arc::new(auth::JwtKeys::new(&jwt_secret)),
    };

    // Load API prefix from environment (default: /api)
    let api_prefix = std::env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string());
    if !api_prefix.is_empty() {
        tracing::info!(prefix = %api_prefix, "API prefix configured");
    }

    // Load CORS allowed origins from environment (optional)
    // Example: CORS_ALLOWED_ORIGINS="https://app.example.com,https://admin.example.com"
    let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    // Build API routes
    let api_routes = Router::new()
        .merge(auth::routes(state.clone()))
        .merge(events::routes(state.clone()))
        .merge(assistant::routes(state.clone()))
        .merge(parse::routes(state));

    let mut app = Router::new().route("/health", get(health));
    app = app.merge(build_router_with_prefix(api_routes, &api_prefix));

    // Add Swagger UI
    let app =
        app.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::ORIGIN,
                ])
                .allow_credentials(true),
        )
    } else {
        app
    };

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let addr = "0.0.0.0:8000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix(api_routes: Router, api_prefix: &str) -> Router {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_routes() -> Router {
        Router::new().route("/events", get(|| async { "ok" }))
    }

    #[tokio::test]
    async fn api_prefix_empty() {
        let app = build_router_with_prefix(test_routes(), "");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn api_prefix_set() {
        let app = build_router_with_prefix(test_routes(), "/api");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }
}
