//! Rows as the store reads and writes them.

use chrono::{DateTime, Utc};
use common::{
    AddressId, CartId, CategoryId, Money, OrderId, OrderStatus, ProductId, ReviewId, UserId,
};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// PHC-formatted password hash.
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// A catalog product with its live price and stock-on-hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_on_hand: i64,
    pub is_active: bool,
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_on_hand: i64,
    pub is_active: bool,
    pub category_id: Option<CategoryId>,
}

/// Partial product update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock_on_hand: Option<i64>,
    pub is_active: Option<bool>,
    /// `Some(None)` detaches the product from its category.
    pub category_id: Option<Option<CategoryId>>,
}

/// A product category. `product_count` is computed on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
}

/// A customer's rating of a product. At most one per user and product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// Author's username, joined in on read.
    pub username: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: u8,
    pub comment: String,
}

/// Outcome of a guarded stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// The decrement was applied.
    Decremented { remaining: i64 },
    /// The product held fewer units than requested; nothing changed.
    Insufficient { available: i64 },
}

/// A user-owned shipping address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal: String,
    pub country: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAddress {
    pub user_id: UserId,
    pub label: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal: String,
    pub country: String,
    pub phone: String,
}

/// A user's cart. Lines carry no price; prices are read live from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A placed order with its frozen line snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub status: OrderStatus,
    pub total: Money,
    pub shipping_cost: Money,
    pub shipping_method: String,
    pub payment_method: String,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quantity and unit price of a product as it was at checkout time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns `unit_price * quantity`.
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price.cents() * i64::from(self.quantity))
    }
}

/// Header and lines of an order about to be inserted. New orders start `pending`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub total: Money,
    pub shipping_cost: Money,
    pub shipping_method: String,
    pub payment_method: String,
    pub lines: Vec<OrderLine>,
}
