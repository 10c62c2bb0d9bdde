//! HTTP route handlers.

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod system;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a UUID-backed identifier from a path segment or body field.
fn parse_id<T>(raw: &str, field: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}
