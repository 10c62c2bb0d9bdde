use common::{ProductId, ReviewId};
use store::{NewReview, Review, Store, StoreError, StoreTx};

use super::{RATING_RANGE, ReviewError};
use crate::auth::Identity;
use crate::catalog::CatalogError;
use crate::error::DomainError;

/// Rating and comment submitted by a reviewer.
#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub rating: u8,
    pub comment: String,
}

impl ReviewInput {
    fn validated(self) -> Result<Self, ReviewError> {
        if !RATING_RANGE.contains(&self.rating) {
            return Err(ReviewError::InvalidRating {
                rating: self.rating,
            });
        }
        Ok(Self {
            rating: self.rating,
            comment: self.comment.trim().to_string(),
        })
    }
}

/// Service for product reviews.
pub struct ReviewService<S: Store> {
    store: S,
}

impl<S: Store> ReviewService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists a product's reviews, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.get_product(product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound(product_id))?;
        let reviews = tx.list_reviews(product_id).await?;
        tx.commit().await?;
        Ok(reviews)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_review(&self, id: ReviewId) -> Result<Review, DomainError> {
        let mut tx = self.store.begin().await?;
        let review = tx.get_review(id).await?;
        tx.commit().await?;
        review.ok_or_else(|| ReviewError::ReviewNotFound(id).into())
    }

    /// Records the caller's review of a product.
    #[tracing::instrument(skip(self, identity, input), fields(user_id = %identity.user_id))]
    pub async fn create_review(
        &self,
        identity: &Identity,
        product_id: ProductId,
        input: ReviewInput,
    ) -> Result<Review, DomainError> {
        let input = input.validated()?;

        let mut tx = self.store.begin().await?;
        tx.get_product(product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound(product_id))?;
        let review = tx
            .insert_review(NewReview {
                product_id,
                user_id: identity.user_id,
                rating: input.rating,
                comment: input.comment,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    DomainError::Review(ReviewError::AlreadyReviewed(product_id))
                }
                other => DomainError::from(other),
            })?;
        tx.commit().await?;

        metrics::counter!("reviews_created_total").increment(1);
        tracing::info!(review_id = %review.id, rating = review.rating, "Review created");
        Ok(review)
    }

    /// Replaces the rating and comment of the caller's own review.
    #[tracing::instrument(skip(self, identity, input), fields(user_id = %identity.user_id))]
    pub async fn update_review(
        &self,
        identity: &Identity,
        id: ReviewId,
        input: ReviewInput,
    ) -> Result<Review, DomainError> {
        let input = input.validated()?;

        let mut tx = self.store.begin().await?;
        let existing = tx
            .get_review(id)
            .await?
            .ok_or(ReviewError::ReviewNotFound(id))?;
        if existing.user_id != identity.user_id {
            return Err(ReviewError::NotAuthor(id).into());
        }

        let review = tx
            .update_review(id, input.rating, input.comment)
            .await?
            .ok_or(ReviewError::ReviewNotFound(id))?;
        tx.commit().await?;
        Ok(review)
    }

    /// Deletes a review. Authors may delete their own; admins may delete any.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn delete_review(
        &self,
        identity: &Identity,
        id: ReviewId,
    ) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        let existing = tx
            .get_review(id)
            .await?
            .ok_or(ReviewError::ReviewNotFound(id))?;
        if existing.user_id != identity.user_id && !identity.is_admin {
            return Err(ReviewError::NotAuthor(id).into());
        }

        tx.delete_review(id).await?;
        tx.commit().await?;

        let by_admin = existing.user_id != identity.user_id;
        tracing::info!(review_id = %id, by_admin, "Review deleted");
        Ok(())
    }
}
