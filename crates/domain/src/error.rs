//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::auth::AuthError;
use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::order::OrderError;
use crate::review::ReviewError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the store outside of a checkout commit.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An error occurred while placing or managing an order.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An error occurred while editing a cart.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// An error occurred in the catalog.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// An error occurred while writing or managing a review.
    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    /// Authentication or authorization failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// A request field failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DomainError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        DomainError::InvalidInput(message.into())
    }
}
