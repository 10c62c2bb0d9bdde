//! Domain layer for the shop backend.
//!
//! Each service wraps a [`store::Store`] and runs its operation inside one
//! store transaction:
//! - [`OrderService`] turns a user's cart into an order, decrementing stock
//!   and clearing the cart atomically
//! - [`CartService`], [`CatalogService`] and [`AddressService`] manage the
//!   data checkout reads
//! - [`CategoryService`] and [`ReviewService`] organize and rate the catalog
//! - [`AuthService`] registers users and issues signed session tokens

pub mod address;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;
pub mod review;

#[cfg(test)]
mod testing;

pub use address::{AddressInput, AddressService};
pub use auth::{AuthError, AuthService, Identity, Registration, Session, TokenSigner};
pub use cart::{CartError, CartItemView, CartService, CartView};
pub use catalog::{CatalogError, CatalogService, CategoryService, ProductInput};
pub use error::DomainError;
pub use order::{OrderError, OrderService, PlaceOrder};
pub use review::{ReviewError, ReviewInput, ReviewService};
