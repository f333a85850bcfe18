// Login and bearer-token auth
//
// Password digests are SHA-256 hex; tokens are HS256 JWTs with a 24 hour
// expiry. The verified user id flows into every event and assistant route
// through the AuthUser extractor; the engine never sees credentials.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use followup_storage::UserRow;

use crate::AppState;

/// Signing and verification keys derived from FOLLOWUP_JWT_SECRET
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a 24 hour bearer token for the user
    fn issue(&self, user_id: Uuid, username: &str) -> jsonwebtoken::errors::Result<String> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: (Utc::now() + Duration::hours(24)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Verify a bearer token and recover the caller's identity
    fn verify(&self, token: &str) -> Option<AuthUser> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .ok()
            .map(|data| AuthUser {
                id: data.claims.sub,
                username: data.claims.username,
            })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    username: String,
    exp: i64,
}

/// SHA-256 hex digest used for stored passwords
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Verified identity of the calling user
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        state.jwt.verify(token).ok_or(StatusCode::UNAUTHORIZED)
    }
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/users/me", get(me))
        .with_state(state)
}

/// POST /auth/login - Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    let user = state
        .db
        .get_user_by_username(&req.username)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up user: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if password_digest(&req.password) != user.password_digest {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let access_token = state.jwt.issue(user.id, &user.username).map_err(|e| {
        tracing::error!("Failed to sign token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: user.into(),
    }))
}

/// GET /users/me - Profile of the authenticated user
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfile>, StatusCode> {
    let row = state
        .db
        .get_user(user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load user: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(row.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let digest = password_digest("alice123");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, password_digest("alice123"));
        assert_ne!(digest, password_digest("bob123"));
    }

    #[test]
    fn issued_token_round_trips_through_verify() {
        let keys = JwtKeys::new("test-secret");
        let user_id = Uuid::now_v7();

        let token = keys.issue(user_id, "alice").unwrap();
        let user = keys.verify(&token).unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn foreign_or_garbled_tokens_are_rejected() {
        let keys = JwtKeys::new("test-secret");
        let other = JwtKeys::new("another-secret");

        let token = other.issue(Uuid::now_v7(), "alice").unwrap();
        assert!(keys.verify(&token).is_none());
        assert!(keys.verify("not-a-token").is_none());
    }
}
