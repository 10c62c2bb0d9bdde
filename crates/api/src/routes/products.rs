//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CategoryId, Money, ProductId};
use domain::ProductInput;
use serde::{Deserialize, Deserializer, Serialize};
use store::{Product, ProductUpdate, Store};

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Minor currency units.
    pub price: i64,
    pub stock_on_hand: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub category_id: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock_on_hand: Option<i64>,
    pub is_active: Option<bool>,
    /// Absent leaves the category unchanged; `null` removes it.
    #[serde(default, deserialize_with = "present")]
    pub category_id: Option<Option<String>>,
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
pub struct ListProductsQuery {
    pub category: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock_on_hand: i64,
    pub is_active: bool,
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            description: product.description,
            price: product.price.cents(),
            stock_on_hand: product.stock_on_hand,
            is_active: product.is_active,
            category_id: product.category_id.map(|c| c.to_string()),
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

// -- Handlers --

/// GET /products: products for sale, newest first. `?category=<id>` narrows
/// the list to one category.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let category = query
        .category
        .as_deref()
        .map(|raw| parse_id::<CategoryId>(raw, "category id"))
        .transpose()?;
    let products = state.catalog.list_products(category).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id: ProductId = parse_id(&id, "product id")?;
    let product = state.catalog.get_product(id).await?;
    Ok(Json(product.into()))
}

/// POST /products (admin)
#[tracing::instrument(skip(state, identity, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    JsonBody(req): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let category_id = req
        .category_id
        .as_deref()
        .map(|raw| parse_id::<CategoryId>(raw, "category id"))
        .transpose()?;
    let product = state
        .catalog
        .create_product(
            &identity,
            ProductInput {
                name: req.name,
                description: req.description,
                price: Money::from_cents(req.price),
                stock_on_hand: req.stock_on_hand,
                is_active: req.is_active,
                category_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PATCH /products/{id} (admin)
#[tracing::instrument(skip(state, identity, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id: ProductId = parse_id(&id, "product id")?;
    let update = ProductUpdate {
        name: req.name,
        description: req.description,
        price: req.price.map(Money::from_cents),
        stock_on_hand: req.stock_on_hand,
        is_active: req.is_active,
        category_id: req
            .category_id
            .map(|raw| {
                raw.as_deref()
                    .map(|raw| parse_id::<CategoryId>(raw, "category id"))
                    .transpose()
            })
            .transpose()?,
    };

    let product = state.catalog.update_product(&identity, id, update).await?;
    Ok(Json(product.into()))
}
