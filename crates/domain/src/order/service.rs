//! Order service: checkout plus order queries and status changes.

use std::time::Instant;

use common::{Money, OrderId, OrderStatus, UserId};
use store::{NewOrder, Order, OrderLine, StockDecrement, Store, StoreTx};

use super::{OrderError, PlaceOrder};
use crate::auth::Identity;
use crate::error::DomainError;

/// A cart line priced and checked against the catalog during validation.
struct ValidatedLine {
    line: OrderLine,
    product_name: String,
}

/// Service for placing and managing orders.
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Converts the caller's cart into an order.
    ///
    /// Everything runs in one store transaction: the cart, address and
    /// stock checks, then the order insert, stock decrements and cart
    /// clearing. Any failure leaves cart, stock and orders untouched.
    #[tracing::instrument(skip(self, identity, cmd), fields(user_id = %identity.user_id))]
    pub async fn place_order(
        &self,
        identity: &Identity,
        cmd: PlaceOrder,
    ) -> Result<Order, DomainError> {
        let started = Instant::now();
        let result = self.checkout(identity.user_id, cmd).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::histogram!("order_checkout_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => rejection_reason(e))
                    .increment(1);
                tracing::warn!(error = %e, "Order rejected");
            }
        }

        result
    }

    async fn checkout(&self, user_id: UserId, cmd: PlaceOrder) -> Result<Order, DomainError> {
        if cmd.shipping_cost.is_negative() {
            return Err(DomainError::invalid("shipping cost cannot be negative"));
        }

        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.store.begin().await?;

        let cart = tx
            .get_cart(user_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(OrderError::EmptyCart)?;

        tx.get_address(cmd.address_id, user_id)
            .await?
            .ok_or(OrderError::AddressNotOwned(cmd.address_id))?;

        let mut validated = Vec::with_capacity(cart.lines.len());
        let mut total = Money::zero();
        for cart_line in &cart.lines {
            let product = tx
                .get_product(cart_line.product_id)
                .await?
                .ok_or(OrderError::UnknownProduct(cart_line.product_id))?;

            if i64::from(cart_line.quantity) > product.stock_on_hand {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    product_name: product.name,
                    available: product.stock_on_hand,
                    requested: cart_line.quantity,
                }
                .into());
            }

            let subtotal = product
                .price
                .checked_multiply(cart_line.quantity)
                .ok_or(OrderError::TotalOverflow)?;
            total = total.checked_add(subtotal).ok_or(OrderError::TotalOverflow)?;

            validated.push(ValidatedLine {
                line: OrderLine {
                    product_id: product.id,
                    quantity: cart_line.quantity,
                    unit_price: product.price,
                },
                product_name: product.name,
            });
        }
        let total = total
            .checked_add(cmd.shipping_cost)
            .ok_or(OrderError::TotalOverflow)?;

        let order = tx
            .insert_order(NewOrder {
                user_id,
                address_id: cmd.address_id,
                total,
                shipping_cost: cmd.shipping_cost,
                shipping_method: cmd.shipping_method,
                payment_method: cmd.payment_method,
                lines: validated.iter().map(|v| v.line).collect(),
            })
            .await
            .map_err(OrderError::TransactionFailed)?;

        // Row locks are taken in product id order so overlapping carts cannot deadlock.
        let mut lock_order: Vec<&ValidatedLine> = validated.iter().collect();
        lock_order.sort_by_key(|v| v.line.product_id);

        for v in lock_order {
            let outcome = tx
                .decrement_stock(v.line.product_id, v.line.quantity)
                .await
                .map_err(OrderError::TransactionFailed)?;

            // A concurrent checkout took the units after validation.
            if let StockDecrement::Insufficient { available } = outcome {
                return Err(OrderError::InsufficientStock {
                    product_id: v.line.product_id,
                    product_name: v.product_name.clone(),
                    available,
                    requested: v.line.quantity,
                }
                .into());
            }
        }

        tx.clear_cart(cart.id)
            .await
            .map_err(OrderError::TransactionFailed)?;
        tx.commit().await.map_err(OrderError::TransactionFailed)?;

        Ok(order)
    }

    /// Lists the caller's orders, newest first.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn list_orders(&self, identity: &Identity) -> Result<Vec<Order>, DomainError> {
        let mut tx = self.store.begin().await?;
        let orders = tx.list_orders(Some(identity.user_id)).await?;
        tx.commit().await?;
        Ok(orders)
    }

    /// Lists every order, newest first. Admin only.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn list_all_orders(&self, identity: &Identity) -> Result<Vec<Order>, DomainError> {
        identity.require_admin()?;

        let mut tx = self.store.begin().await?;
        let orders = tx.list_orders(None).await?;
        tx.commit().await?;
        Ok(orders)
    }

    /// Returns an order visible to the caller: their own, or any for an admin.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn get_order(&self, identity: &Identity, id: OrderId) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .get_order(id)
            .await?
            .ok_or(OrderError::OrderNotFound(id))?;
        tx.commit().await?;

        if order.user_id != identity.user_id && !identity.is_admin {
            return Err(OrderError::AccessDenied(id).into());
        }
        Ok(order)
    }

    /// Moves an order to a new status. Admin only.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn update_status(
        &self,
        identity: &Identity,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, DomainError> {
        identity.require_admin()?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .get_order(id)
            .await?
            .ok_or(OrderError::OrderNotFound(id))?
            .status;

        if !current.can_transition_to(next) || !tx.update_order_status(id, current, next).await? {
            return Err(OrderError::InvalidStatus {
                from: current,
                to: next,
            }
            .into());
        }

        let order = tx
            .get_order(id)
            .await?
            .ok_or(OrderError::OrderNotFound(id))?;
        tx.commit().await?;

        metrics::counter!("order_status_changes_total", "status" => next.as_str()).increment(1);
        tracing::info!(order_id = %id, from = %current, to = %next, "Order status changed");

        Ok(order)
    }
}

fn rejection_reason(error: &DomainError) -> &'static str {
    match error {
        DomainError::Order(e) => e.reason(),
        DomainError::InvalidInput(_) => "invalid_input",
        _ => "store_error",
    }
}
