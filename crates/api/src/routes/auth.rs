//! Account registration, login and session endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use chrono::{DateTime, Utc};
use domain::{Identity, Registration, Session};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::extract::{AUTH_COOKIE, CurrentUser, JsonBody};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Clients may send `login`, `username` or `email`; the first present wins.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub login: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

impl LoginRequest {
    fn login(&self) -> Option<&str> {
        [&self.login, &self.username, &self.email]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct IdentityResponse {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&Identity> for IdentityResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.to_string(),
            email: identity.email.clone(),
            is_admin: identity.is_admin,
        }
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: IdentityResponse,
}

type SessionReply = (StatusCode, [(header::HeaderName, String); 1], Json<SessionResponse>);

fn session_reply(status: StatusCode, session: Session) -> SessionReply {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = format!(
        "{AUTH_COOKIE}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}",
        session.token
    );
    let body = SessionResponse {
        user: IdentityResponse::from(&session.identity),
        token: session.token,
        token_type: "Bearer",
        expires_at: session.expires_at,
    };
    (status, [(header::SET_COOKIE, cookie)], Json(body))
}

// -- Handlers --

/// POST /auth/register: creates a customer account and signs it in.
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn register<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<SessionReply, ApiError> {
    let session = state
        .auth
        .register(Registration {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok(session_reply(StatusCode::CREATED, session))
}

/// POST /auth/login
#[tracing::instrument(skip(state, req))]
pub async fn login<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<SessionReply, ApiError> {
    let login = req
        .login()
        .ok_or_else(|| ApiError::BadRequest("login, username or email is required".to_string()))?;
    let session = state.auth.login(login, &req.password).await?;
    Ok(session_reply(StatusCode::OK, session))
}

/// POST /auth/logout: expires the session cookie. Tokens are stateless, so
/// bearer clients simply discard theirs.
pub async fn logout() -> (StatusCode, [(header::HeaderName, String); 1]) {
    (
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            format!("{AUTH_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"),
        )],
    )
}

/// GET /me
pub async fn me(CurrentUser(identity): CurrentUser) -> Json<IdentityResponse> {
    Json(IdentityResponse::from(&identity))
}
