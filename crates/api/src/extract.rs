//! Request extractors.

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, request::Parts};
use domain::{AuthError, Identity};
use store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// JSON request body whose rejections are reported as [`ApiError::BadRequest`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Extractor that requires a valid session token.
///
/// The token is read from `Authorization: Bearer <token>` or, failing that,
/// from the `auth_token` cookie.
pub struct CurrentUser(pub Identity);

impl<S: Store + 'static> FromRequestParts<Arc<AppState<S>>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers))
            .ok_or(AuthError::Unauthenticated)?;

        let identity = state.auth.authenticate(token).inspect_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
        })?;

        Ok(Self(identity))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}
