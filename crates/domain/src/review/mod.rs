//! Customer reviews of catalog products.

mod service;

pub use service::{ReviewInput, ReviewService};

use common::{ProductId, ReviewId};
use thiserror::Error;

/// Lowest and highest star rating a review may carry.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Errors that can occur while writing or managing reviews.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Invalid rating: {rating} (must be between 1 and 5)")]
    InvalidRating { rating: u8 },

    #[error("Review not found: {0}")]
    ReviewNotFound(ReviewId),

    /// Each user may review a product once; later opinions are edits.
    #[error("You have already reviewed product {0}")]
    AlreadyReviewed(ProductId),

    #[error("Only the author may change review {0}")]
    NotAuthor(ReviewId),
}
