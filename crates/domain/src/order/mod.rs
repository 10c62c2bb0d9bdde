//! Checkout workflow and order management.

mod commands;
mod service;

pub use commands::PlaceOrder;
pub use service::OrderService;

use common::{AddressId, OrderId, OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The caller's cart has no lines.
    #[error("Cannot place an order from an empty cart")]
    EmptyCart,

    /// The address does not exist or belongs to someone else.
    #[error("Address {0} does not belong to the caller")]
    AddressNotOwned(AddressId),

    /// A cart line references a product that no longer exists.
    #[error("Product not found: {0}")]
    UnknownProduct(ProductId),

    /// A product holds fewer units than the cart asks for.
    #[error(
        "Insufficient stock for product '{product_name}'. Available: {available}, Requested: {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        available: i64,
        requested: u32,
    },

    /// The order total does not fit in the money type.
    #[error("Order total overflows")]
    TotalOverflow,

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The caller neither owns the order nor is an admin.
    #[error("Access denied to order {0}")]
    AccessDenied(OrderId),

    /// The status change is not allowed from the current status.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatus { from: OrderStatus, to: OrderStatus },

    /// A write failed while committing the checkout; nothing was applied.
    #[error("Transaction failed: {0}")]
    TransactionFailed(#[source] StoreError),
}

impl OrderError {
    /// Short label used for the rejection metric.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::EmptyCart => "empty_cart",
            OrderError::AddressNotOwned(_) => "address_not_owned",
            OrderError::UnknownProduct(_) => "unknown_product",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::TotalOverflow => "total_overflow",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::AccessDenied(_) => "access_denied",
            OrderError::InvalidStatus { .. } => "invalid_status",
            OrderError::TransactionFailed(_) => "transaction_failed",
        }
    }
}
