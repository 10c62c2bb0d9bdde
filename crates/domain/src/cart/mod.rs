//! Per-user shopping carts.

mod service;

pub use service::{CartItemView, CartService, CartView};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur while editing a cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantities must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The product does not exist or is not for sale.
    #[error("Product not available: {0}")]
    ProductUnavailable(ProductId),

    /// The cart has no line for this product.
    #[error("Product not in cart: {0}")]
    LineNotFound(ProductId),
}
