//! Checkout and order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AddressId, Money, OrderId, OrderStatus};
use domain::PlaceOrder;
use serde::{Deserialize, Serialize};
use store::{Order, Store};

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub address_id: String,
    pub shipping_method: String,
    pub payment_method: String,
    /// Minor currency units.
    #[serde(default)]
    pub shipping_cost: i64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: String,
    pub total: i64,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub subtotal: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub address_id: String,
    pub status: OrderStatus,
    pub total: i64,
    pub shipping_cost: i64,
    pub shipping_method: String,
    pub payment_method: String,
    pub lines: Vec<OrderLineResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            address_id: order.address_id.to_string(),
            status: order.status,
            total: order.total.cents(),
            shipping_cost: order.shipping_cost.cents(),
            shipping_method: order.shipping_method,
            payment_method: order.payment_method,
            lines: order
                .lines
                .iter()
                .map(|line| OrderLineResponse {
                    product_id: line.product_id.to_string(),
                    quantity: line.quantity,
                    unit_price: line.unit_price.cents(),
                    subtotal: line.subtotal().cents(),
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

fn to_responses(orders: Vec<Order>) -> Vec<OrderResponse> {
    orders.into_iter().map(Into::into).collect()
}

// -- Handlers --

/// POST /orders: checks out the caller's cart.
#[tracing::instrument(skip(state, identity, req))]
pub async fn place<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    JsonBody(req): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let address_id: AddressId = parse_id(&req.address_id, "address_id")?;

    let order = state
        .orders
        .place_order(
            &identity,
            PlaceOrder {
                address_id,
                shipping_method: req.shipping_method,
                payment_method: req.payment_method,
                shipping_cost: Money::from_cents(req.shipping_cost),
            },
        )
        .await?;

    let response = OrderPlacedResponse {
        order_id: order.id.to_string(),
        total: order.total.cents(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state, identity))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(&identity).await?;
    Ok(Json(to_responses(orders)))
}

/// GET /orders/{id}: owner or admin.
#[tracing::instrument(skip(state, identity))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order id")?;
    let order = state.orders.get_order(&identity, id).await?;
    Ok(Json(order.into()))
}

/// GET /admin/orders
#[tracing::instrument(skip(state, identity))]
pub async fn list_all<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_all_orders(&identity).await?;
    Ok(Json(to_responses(orders)))
}

/// PUT /orders/{id}/status (admin)
#[tracing::instrument(skip(state, identity, req))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order id")?;
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: common::ParseStatusError| ApiError::BadRequest(e.to_string()))?;

    let order = state.orders.update_status(&identity, id, status).await?;
    Ok(Json(order.into()))
}
