//! Cart endpoints. Lines are addressed by product id.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use domain::CartView;
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub name: String,
    pub unit_price: i64,
    pub quantity: u32,
    pub subtotal: i64,
    pub stock_on_hand: i64,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub subtotal: i64,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub removed: u64,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            items: view
                .items
                .into_iter()
                .map(|item| CartItemResponse {
                    product_id: item.product_id.to_string(),
                    name: item.name,
                    unit_price: item.unit_price.cents(),
                    quantity: item.quantity,
                    subtotal: item.subtotal.cents(),
                    stock_on_hand: item.stock_on_hand,
                })
                .collect(),
            subtotal: view.subtotal.cents(),
        }
    }
}

/// GET /cart
#[tracing::instrument(skip(state, identity))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state.carts.get_cart(&identity).await?;
    Ok(Json(view.into()))
}

/// POST /cart/items
#[tracing::instrument(skip(state, identity, req))]
pub async fn add_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id(&req.product_id, "product_id")?;
    let view = state
        .carts
        .add_item(&identity, product_id, req.quantity)
        .await?;
    Ok(Json(view.into()))
}

/// PUT /cart/items/{product_id}
#[tracing::instrument(skip(state, identity, req))]
pub async fn update_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(product_id): Path<String>,
    JsonBody(req): JsonBody<UpdateItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product id")?;
    let view = state
        .carts
        .update_item(&identity, product_id, req.quantity)
        .await?;
    Ok(Json(view.into()))
}

/// DELETE /cart/items/{product_id}
#[tracing::instrument(skip(state, identity))]
pub async fn remove_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product id")?;
    let view = state.carts.remove_item(&identity, product_id).await?;
    Ok(Json(view.into()))
}

/// DELETE /cart
#[tracing::instrument(skip(state, identity))]
pub async fn clear<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ClearedResponse>, ApiError> {
    let removed = state.carts.clear(&identity).await?;
    Ok(Json(ClearedResponse { removed }))
}
