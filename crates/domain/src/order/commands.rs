//! Order commands.

use common::{AddressId, Money};

/// Command to turn the caller's cart into an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// Shipping address; must belong to the caller.
    pub address_id: AddressId,

    /// Opaque shipping method label, stored as given.
    pub shipping_method: String,

    /// Opaque payment method label, stored as given.
    pub payment_method: String,

    /// Added to the line subtotals. Must not be negative.
    pub shipping_cost: Money,
}
