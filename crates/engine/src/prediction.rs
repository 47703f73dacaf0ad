//! Predicted ratings and the strategy that produced them.

use data_loader::MovieId;
use serde::Serialize;
use std::fmt;

/// Which strategy produced a predicted rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    /// Weighted sum over similar movies the user rated
    Similar,
    /// The movie's average rating across all users
    AverageRating,
    /// Nothing better worked
    Fallback,
    /// The user's own regression predictor
    Personalized,
}

impl Reason {
    /// Short machine-readable tag, as written in CSV and JSON output.
    pub fn tag(self) -> &'static str {
        match self {
            Reason::Similar => "similar",
            Reason::AverageRating => "average-rating",
            Reason::Fallback => "fallback",
            Reason::Personalized => "personalized",
        }
    }

    /// Human-readable explanation, meant to follow "Predicted rating: X".
    pub fn explanation(self) -> &'static str {
        match self {
            Reason::Similar => {
                "because of the similarity between this movie and others you've rated."
            }
            Reason::AverageRating => "because of this movie's average rating.",
            Reason::Fallback => "because the other evaluation strategies are failing.",
            Reason::Personalized => "because of how you rated movies like it.",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.explanation())
    }
}

/// A predicted rating for one movie.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// In [MIN_RATING, MAX_RATING]
    pub rating: f64,
    pub movie_id: MovieId,
    pub reason: Reason,
}

impl Prediction {
    pub fn new(rating: f64, movie_id: MovieId, reason: Reason) -> Self {
        Self {
            rating,
            movie_id,
            reason,
        }
    }
}
