//! Error types for the engine crate.

use data_loader::{MovieId, StoreError, UserId};
use pipeline::SchedulerError;
use thiserror::Error;

/// Errors raised while analyzing, predicting or recommending.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The weighted sum has nothing to weigh
    #[error(
        "Can't predict a rating for movie {movie_id}: user {user_id} has rated no similar movies. \
         Try computing similarities for more pairs of movies"
    )]
    NoSimilarMovies { user_id: UserId, movie_id: MovieId },

    #[error("User {0} has no ratings")]
    NoUserRatings(UserId),

    #[error("Can't fit a line through an empty set of points")]
    EmptyGraph,

    /// Every point shares one x value, so the slope is undefined
    #[error("The line of best fit is vertical")]
    VerticalLine,

    #[error("Movie {0} has no release year in its title")]
    NoMovieYear(MovieId),

    #[error("A predictor for {0} is not (yet) implemented")]
    NoSuchPredictor(String),

    /// Every candidate predictor failed for every rated movie
    #[error("No predictor could produce a prediction for user {0}")]
    NoUsablePredictor(UserId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, EngineError>;
