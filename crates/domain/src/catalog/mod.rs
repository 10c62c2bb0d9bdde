//! Product catalog.

mod category;
mod service;

pub use category::CategoryService;
pub use service::{CatalogService, ProductInput};

use common::{CategoryId, ProductId};
use thiserror::Error;

/// Errors that can occur in the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Product name is required")]
    NameRequired,

    #[error("Invalid price: {cents} (cannot be negative)")]
    NegativePrice { cents: i64 },

    #[error("Invalid stock: {stock} (cannot be negative)")]
    NegativeStock { stock: i64 },

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("Category already exists: {0}")]
    CategoryExists(String),

    #[error("Category name must be between 2 and 100 characters")]
    InvalidCategoryName,
}
