//! Cart service.

use common::{Money, ProductId, UserId};
use serde::Serialize;
use store::{Store, StoreTx};

use super::CartError;
use crate::auth::Identity;
use crate::error::DomainError;

/// One cart line priced from the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
    pub stock_on_hand: i64,
}

/// A cart as the customer sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: Money,
}

/// Service for editing the caller's cart.
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the caller's cart. A user who never added anything sees an empty cart.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn get_cart(&self, identity: &Identity) -> Result<CartView, DomainError> {
        let mut tx = self.store.begin().await?;
        let view = load_view(&mut tx, identity.user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Adds units of an active product, merging into an existing line.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn add_item(
        &self,
        identity: &Identity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        require_positive(quantity)?;

        let mut tx = self.store.begin().await?;
        match tx.get_product(product_id).await? {
            Some(product) if product.is_active => {}
            _ => return Err(CartError::ProductUnavailable(product_id).into()),
        }

        let cart_id = tx.ensure_cart(identity.user_id).await?;
        let merged = tx.add_cart_line(cart_id, product_id, quantity).await?;
        tracing::debug!(%product_id, merged, "Cart line updated");

        let view = load_view(&mut tx, identity.user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Overwrites the quantity of an existing line.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn update_item(
        &self,
        identity: &Identity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        require_positive(quantity)?;

        let mut tx = self.store.begin().await?;
        let cart = tx
            .get_cart(identity.user_id)
            .await?
            .ok_or(CartError::LineNotFound(product_id))?;
        if !tx
            .set_cart_line_quantity(cart.id, product_id, quantity)
            .await?
        {
            return Err(CartError::LineNotFound(product_id).into());
        }

        let view = load_view(&mut tx, identity.user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Removes a line from the cart.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn remove_item(
        &self,
        identity: &Identity,
        product_id: ProductId,
    ) -> Result<CartView, DomainError> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .get_cart(identity.user_id)
            .await?
            .ok_or(CartError::LineNotFound(product_id))?;
        if !tx.delete_cart_line(cart.id, product_id).await? {
            return Err(CartError::LineNotFound(product_id).into());
        }

        let view = load_view(&mut tx, identity.user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Empties the cart. Returns the number of lines removed.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn clear(&self, identity: &Identity) -> Result<u64, DomainError> {
        let mut tx = self.store.begin().await?;
        let removed = match tx.get_cart(identity.user_id).await? {
            Some(cart) => tx.clear_cart(cart.id).await?,
            None => 0,
        };
        tx.commit().await?;
        Ok(removed)
    }
}

fn require_positive(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
        Err(CartError::InvalidQuantity { quantity })
    } else {
        Ok(())
    }
}

async fn load_view<T: StoreTx>(tx: &mut T, user_id: UserId) -> Result<CartView, DomainError> {
    let Some(cart) = tx.get_cart(user_id).await? else {
        return Ok(CartView::default());
    };

    let mut view = CartView::default();
    for line in cart.lines {
        // Lines whose product vanished are skipped; checkout rejects them.
        let Some(product) = tx.get_product(line.product_id).await? else {
            continue;
        };
        let subtotal = product
            .price
            .checked_multiply(line.quantity)
            .ok_or_else(|| DomainError::invalid("cart line total overflows"))?;
        view.subtotal = view
            .subtotal
            .checked_add(subtotal)
            .ok_or_else(|| DomainError::invalid("cart total overflows"))?;
        view.items.push(CartItemView {
            product_id: product.id,
            name: product.name,
            unit_price: product.price,
            quantity: line.quantity,
            subtotal,
            stock_on_hand: product.stock_on_hand,
        });
    }
    Ok(view)
}
