//! Persistence layer for the shop backend.
//!
//! All reads and writes go through a [`StoreTx`] obtained from [`Store::begin`],
//! so a service can group several statements into one atomic unit of work.
//! Two implementations are provided: [`InMemoryStore`] for tests and local
//! runs, and [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use common::{
    AddressId, CartId, CategoryId, Money, OrderId, OrderStatus, ProductId, ReviewId, UserId,
};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};
pub use records::{
    Address, Cart, CartLine, Category, NewAddress, NewCategory, NewOrder, NewProduct, NewReview,
    NewUser, Order, OrderLine, Product, ProductUpdate, Review, StockDecrement, User,
};
pub use store::{Store, StoreTx};
