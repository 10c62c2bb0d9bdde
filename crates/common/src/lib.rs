//! Shared types for the shop backend.
//!
//! Everything here is plain data that more than one crate needs to agree on:
//! entity identifiers, monetary amounts and the order status lifecycle.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, ParseStatusError};
pub use types::{AddressId, CartId, CategoryId, OrderId, ProductId, ReviewId, UserId};
