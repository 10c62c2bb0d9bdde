//! Product review endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ProductId, ReviewId};
use domain::ReviewInput;
use serde::{Deserialize, Serialize};
use store::{Review, Store};

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ReviewRequest {
    /// Stars, 1 to 5.
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl From<ReviewRequest> for ReviewInput {
    fn from(req: ReviewRequest) -> Self {
        Self {
            rating: req.rating,
            comment: req.comment,
        }
    }
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    pub username: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id.to_string(),
            product_id: review.product_id.to_string(),
            user_id: review.user_id.to_string(),
            username: review.username,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

/// GET /products/{id}/reviews: newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
) -> Result<Json<Vec<ReviewResponse>>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product id")?;
    let reviews = state.reviews.list_reviews(product_id).await?;
    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}

/// POST /products/{id}/reviews
#[tracing::instrument(skip(state, identity, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(product_id): Path<String>,
    JsonBody(req): JsonBody<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product id")?;
    let review = state
        .reviews
        .create_review(&identity, product_id, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(review.into())))
}

/// GET /reviews/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let id: ReviewId = parse_id(&id, "review id")?;
    let review = state.reviews.get_review(id).await?;
    Ok(Json(review.into()))
}

/// PUT /reviews/{id} (author)
#[tracing::instrument(skip(state, identity, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let id: ReviewId = parse_id(&id, "review id")?;
    let review = state
        .reviews
        .update_review(&identity, id, req.into())
        .await?;
    Ok(Json(review.into()))
}

/// DELETE /reviews/{id} (author or admin)
#[tracing::instrument(skip(state, identity))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ReviewId = parse_id(&id, "review id")?;
    state.reviews.delete_review(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
