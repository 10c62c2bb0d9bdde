//! Order status state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of a placed order.
///
/// Allowed transitions:
/// ```text
/// Pending ──► Processing ──► Shipped ──► Completed
///    │             │
///    └─────────────┴──► Canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order placed, awaiting processing.
    #[default]
    Pending,

    /// Order is being prepared.
    Processing,

    /// Order has left the warehouse.
    Shipped,

    /// Order delivered (terminal state).
    Completed,

    /// Order was canceled (terminal state).
    Canceled,
}

/// Returned when a string does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl OrderStatus {
    /// Returns true if an order may move from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::Canceled)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Processing, OrderStatus::Canceled)
                | (OrderStatus::Shipped, OrderStatus::Completed)
        )
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
