//! Catalog service.

use common::{CategoryId, Money, ProductId};
use store::{NewProduct, Product, ProductUpdate, Store, StoreTx};

use super::CatalogError;
use crate::auth::Identity;
use crate::error::DomainError;

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_on_hand: i64,
    pub is_active: bool,
    pub category_id: Option<CategoryId>,
}

/// Service for browsing and administering products.
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists products for sale, newest first, optionally within one category.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(
        &self,
        category: Option<CategoryId>,
    ) -> Result<Vec<Product>, DomainError> {
        let mut tx = self.store.begin().await?;
        if let Some(id) = category {
            tx.get_category(id)
                .await?
                .ok_or(CatalogError::CategoryNotFound(id))?;
        }
        let products = tx.list_products(true).await?;
        tx.commit().await?;

        Ok(products
            .into_iter()
            .filter(|p| category.is_none() || p.category_id == category)
            .collect())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        let mut tx = self.store.begin().await?;
        let product = tx.get_product(id).await?;
        tx.commit().await?;
        product.ok_or_else(|| CatalogError::ProductNotFound(id).into())
    }

    /// Adds a product to the catalog. Admin only.
    #[tracing::instrument(skip(self, identity, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        identity: &Identity,
        input: ProductInput,
    ) -> Result<Product, DomainError> {
        identity.require_admin()?;

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::NameRequired.into());
        }
        validate_amounts(Some(input.price), Some(input.stock_on_hand))?;

        let mut tx = self.store.begin().await?;
        require_category(&mut tx, input.category_id).await?;
        let product = tx
            .insert_product(NewProduct {
                name,
                description: input.description,
                price: input.price,
                stock_on_hand: input.stock_on_hand,
                is_active: input.is_active,
                category_id: input.category_id,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Applies a partial update to a product. Admin only.
    #[tracing::instrument(skip(self, identity, update))]
    pub async fn update_product(
        &self,
        identity: &Identity,
        id: ProductId,
        mut update: ProductUpdate,
    ) -> Result<Product, DomainError> {
        identity.require_admin()?;

        if let Some(name) = update.name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                return Err(CatalogError::NameRequired.into());
            }
        }
        validate_amounts(update.price, update.stock_on_hand)?;

        let mut tx = self.store.begin().await?;
        require_category(&mut tx, update.category_id.flatten()).await?;
        let product = tx
            .update_product(id, update)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))?;
        tx.commit().await?;

        tracing::info!(product_id = %id, "Product updated");
        Ok(product)
    }
}

async fn require_category<T: StoreTx>(
    tx: &mut T,
    id: Option<CategoryId>,
) -> Result<(), DomainError> {
    if let Some(id) = id {
        tx.get_category(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound(id))?;
    }
    Ok(())
}

fn validate_amounts(price: Option<Money>, stock: Option<i64>) -> Result<(), CatalogError> {
    if let Some(price) = price.filter(Money::is_negative) {
        return Err(CatalogError::NegativePrice {
            cents: price.cents(),
        });
    }
    if let Some(stock) = stock.filter(|s| *s < 0) {
        return Err(CatalogError::NegativeStock { stock });
    }
    Ok(())
}
