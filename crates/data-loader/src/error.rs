//! Error types for the data-loader crate.
//!
//! Two families live here:
//! - `DataLoadError` for reading and validating the dataset files
//! - `StoreError` for reads and writes against the storage gateway

use thiserror::Error;

use crate::types::{MovieId, UserId};

/// Errors that can occur during data loading and parsing
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist (e.g., rating for non-existent movie)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: u32 },

    /// Data validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;

/// Errors raised by the storage gateway.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No average rating for user {0} has been calculated")]
    MissingAverageRating(UserId),

    #[error("A similarity score hasn't been computed for movies {0} and {1}")]
    MissingSimilarity(MovieId, MovieId),

    #[error("User {0} has no personalized predictor. Generate one with `analyze ml`")]
    NoPersonalizedPredictor(UserId),

    #[error("Movie {0} has not been rated by anyone")]
    NoMovieRatings(MovieId),

    /// Pairing a movie with itself is never meaningful
    #[error("Movie {0} cannot be paired with itself")]
    SelfPair(MovieId),

    #[error("Movie {0} is not in the dataset")]
    UnknownMovie(MovieId),

    #[error("User {user_id} has not rated movie {movie_id}")]
    MissingRating { user_id: UserId, movie_id: MovieId },

    #[error("Analysis tables are unavailable: a writer panicked while holding the lock")]
    LockPoisoned,

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for storage gateway operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
