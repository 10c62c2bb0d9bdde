//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AuthError, CartError, CatalogError, DomainError, OrderError, ReviewError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request data caught before reaching a service.
    BadRequest(String),
    /// Error returned by a domain service.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::EmptyCart
            | OrderError::AddressNotOwned(_)
            | OrderError::UnknownProduct(_)
            | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::InsufficientStock { .. } | OrderError::InvalidStatus { .. } => {
                StatusCode::CONFLICT
            }
            OrderError::AccessDenied(_) => StatusCode::FORBIDDEN,
            OrderError::TotalOverflow => StatusCode::BAD_REQUEST,
            OrderError::TransactionFailed(source) => {
                tracing::error!(error = %source, "checkout transaction failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Transaction failed; no changes were made".to_string(),
                );
            }
        },
        DomainError::Cart(cart_err) => match cart_err {
            CartError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
            CartError::ProductUnavailable(_) | CartError::LineNotFound(_) => StatusCode::NOT_FOUND,
        },
        DomainError::Catalog(
            CatalogError::ProductNotFound(_) | CatalogError::CategoryNotFound(_),
        ) => StatusCode::NOT_FOUND,
        DomainError::Catalog(CatalogError::CategoryExists(_)) => StatusCode::CONFLICT,
        DomainError::Catalog(_) | DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DomainError::Review(review_err) => match review_err {
            ReviewError::InvalidRating { .. } => StatusCode::BAD_REQUEST,
            ReviewError::ReviewNotFound(_) => StatusCode::NOT_FOUND,
            ReviewError::AlreadyReviewed(_) => StatusCode::CONFLICT,
            ReviewError::NotAuthor(_) => StatusCode::FORBIDDEN,
        },
        DomainError::Auth(auth_err) => match auth_err {
            AuthError::Unauthenticated
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
        },
        DomainError::Store(source) => {
            tracing::error!(error = %source, "store error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };

    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Domain(DomainError::Auth(err))
    }
}
