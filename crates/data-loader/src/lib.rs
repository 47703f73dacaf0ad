//! # Data Loader Crate
//!
//! This crate loads the MovieLens dataset and owns the storage gateway every
//! analysis reads from and writes to.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Movie, Rating, Similarity, DataIndex)
//! - **parser**: Parse .dat files into Rust structs
//! - **index**: Build and validate the in-memory index
//! - **store**: Read/write gateway over raw rows and analysis tables
//! - **error**: Error types for loading and storage
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataIndex, RatingsReader, Store};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let index = DataIndex::load_from_files(Path::new("data/ml-1m"))?;
//! let store = Store::new(Arc::new(index));
//! store.load_snapshot(Path::new("data/ml-1m/analysis.json"))?;
//!
//! let ratings = store.user_ratings(1)?;
//! println!("User 1 rated {} movies", ratings.len());
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result, StoreError, StoreResult};
pub use store::{AnalysisWriter, RatingsReader, Snapshot, Store};
pub use types::{
    // Type aliases and bounds
    UserId,
    MovieId,
    MIN_RATING,
    MAX_RATING,
    // Raw rows
    Movie,
    Rating,
    RatingPair,
    MovieStats,
    DataIndex,
    Genre,
    // Derived rows
    AvgRating,
    Similarity,
    PredictorAssignment,
    canonical_pair,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_index_creation() {
        let index = DataIndex::new();
        let (users, movies, ratings) = index.counts();

        assert_eq!(users, 0);
        assert_eq!(movies, 0);
        assert_eq!(ratings, 0);
    }

    #[test]
    fn test_insert_rating() {
        let mut index = DataIndex::new();

        let rating = Rating {
            user_id: 1,
            movie_id: 1193,
            rating: 5.0,
            timestamp: 978300760,
        };

        index.insert_rating(rating);

        let user_ratings = index.get_user_ratings(1);
        assert_eq!(user_ratings.len(), 1);
        assert_eq!(user_ratings[0].rating, 5.0);

        assert_eq!(index.get_movie_ratings(1193).len(), 1);
        assert_eq!(index.get_rating(1, 1193), Some(5.0));
    }

    #[test]
    fn test_empty_queries() {
        let index = DataIndex::new();

        // Querying non-existent data should return None or empty slices
        assert!(index.get_movie(999).is_none());
        assert!(index.get_user_ratings(999).is_empty());
        assert!(index.get_movie_ratings(999).is_empty());
        assert!(index.get_rating(1, 999).is_none());
    }
}
