//! Weighted-sum rating prediction.
//!
//! ## Algorithm
//! 1. Map every rating onto [-1, 1]
//! 2. Average the user's normalized ratings of movies similar to the target,
//!    weighting each by its similarity score and dividing by the sum of the
//!    absolute scores
//! 3. Map the result back onto [MIN_RATING, MAX_RATING]
//!
//! See "Item-Based Collaborative Filtering Recommendation Algorithms"
//! (Sarwar et al.) for the derivation.

use crate::error::{EngineError, Result};
use crate::prediction::{Prediction, Reason};
use data_loader::{MovieId, RatingsReader, StoreError, UserId, MAX_RATING, MIN_RATING};
use tracing::debug;

/// Map a rating in [MIN_RATING, MAX_RATING] onto [-1, 1].
pub fn normalize_rating(rating: f64) -> f64 {
    (2.0 * (rating - MIN_RATING) - (MAX_RATING - MIN_RATING)) / (MAX_RATING - MIN_RATING)
}

/// Map a value in [-1, 1] back onto [MIN_RATING, MAX_RATING].
pub fn denormalize_rating(normalized: f64) -> f64 {
    (normalized + 1.0) * (MAX_RATING - MIN_RATING) / 2.0 + MIN_RATING
}

/// Predict a user's rating for a movie from stored similarities.
///
/// # Returns
/// * `Ok(f64)` - The predicted rating, in [MIN_RATING, MAX_RATING]
/// * `Err(NoSimilarMovies)` - The user rated no movie with a non-zero
///   similarity to `movie_id`
pub fn predict_rating<R: RatingsReader + ?Sized>(
    reader: &R,
    user_id: UserId,
    movie_id: MovieId,
) -> Result<f64> {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (similar_movie, similarity) in reader.similar_movies_for_user(movie_id, user_id)? {
        numerator += similarity * normalize_rating(reader.rating(user_id, similar_movie)?);
        denominator += similarity.abs();
    }

    if denominator == 0.0 {
        return Err(EngineError::NoSimilarMovies { user_id, movie_id });
    }
    Ok(denormalize_rating(numerator / denominator).clamp(MIN_RATING, MAX_RATING))
}

/// Predict a rating for display, falling back when similarities are missing.
///
/// Tries, in order: the weighted sum, the movie's average rating, the user's
/// stored average rating. The reason records which one answered.
pub fn predict_rating_for_display<R: RatingsReader + ?Sized>(
    reader: &R,
    user_id: UserId,
    movie_id: MovieId,
) -> Result<Prediction> {
    match predict_rating(reader, user_id, movie_id) {
        Ok(rating) => Ok(Prediction::new(rating, movie_id, Reason::Similar)),
        Err(EngineError::NoSimilarMovies { .. }) => {
            debug!("No similar movies for {}; trying the movie's average", movie_id);
            match reader.avg_movie_rating(movie_id) {
                Ok(rating) => Ok(Prediction::new(rating, movie_id, Reason::AverageRating)),
                Err(StoreError::NoMovieRatings(_)) => {
                    let rating = reader.avg_rating(user_id)?;
                    Ok(Prediction::new(rating, movie_id, Reason::Fallback))
                }
                Err(err) => Err(err.into()),
            }
        }
        Err(err) => Err(err),
    }
}

/// Predict a rating for ranking, scoring MIN_RATING when similarities are
/// missing.
pub fn predict_rating_for_ranking<R: RatingsReader + ?Sized>(
    reader: &R,
    user_id: UserId,
    movie_id: MovieId,
) -> Result<Prediction> {
    match predict_rating(reader, user_id, movie_id) {
        Ok(rating) => Ok(Prediction::new(rating, movie_id, Reason::Similar)),
        Err(EngineError::NoSimilarMovies { .. }) => {
            Ok(Prediction::new(MIN_RATING, movie_id, Reason::Fallback))
        }
        Err(err) => Err(err),
    }
}
