//! Category endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::CategoryId;
use serde::{Deserialize, Serialize};
use store::{Category, Store};

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id.to_string(),
            name: category.name,
            slug: category.slug,
            product_count: category.product_count,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

/// GET /categories
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = state.categories.list_categories().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

/// GET /categories/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let id: CategoryId = parse_id(&id, "category id")?;
    let category = state.categories.get_category(id).await?;
    Ok(Json(category.into()))
}

/// POST /categories (admin)
#[tracing::instrument(skip(state, identity, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let category = state
        .categories
        .create_category(&identity, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(category.into())))
}

/// PUT /categories/{id} (admin): renames the category and regenerates its slug.
#[tracing::instrument(skip(state, identity, req))]
pub async fn rename<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let id: CategoryId = parse_id(&id, "category id")?;
    let category = state
        .categories
        .rename_category(&identity, id, &req.name)
        .await?;
    Ok(Json(category.into()))
}

/// DELETE /categories/{id} (admin)
#[tracing::instrument(skip(state, identity))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: CategoryId = parse_id(&id, "category id")?;
    state.categories.delete_category(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
