//! Core domain types for the MovieLens dataset and the derived analysis tables.
//!
//! This module defines the fundamental data structures used throughout the system:
//! - Type aliases for domain clarity (UserId, MovieId)
//! - Raw rows (Movie, Rating) as they come out of the dataset files
//! - Derived rows (AvgRating, Similarity, PredictorAssignment) written by analyses
//! - `DataIndex`, the in-memory table of raw rows

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DataLoadError;

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a movie
pub type MovieId = u32;

/// The smallest rating a user can assign to a movie.
pub const MIN_RATING: f64 = 0.5;

/// The largest rating a user can assign to a movie.
pub const MAX_RATING: f64 = 5.0;

// =============================================================================
// Movie-related Types
// =============================================================================

/// Represents a movie in the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Release year extracted from the title, e.g. "Toy Story (1995)".
    /// `None` when the title carries no `(YYYY)` group.
    pub year: Option<u16>,
    pub genres: Vec<Genre>,
}

/// Movie genres from MovieLens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Genre {
    NoGenresListed,
    Action,
    Adventure,
    Animation,
    Children,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Fantasy,
    FilmNoir,
    Horror,
    Musical,
    Mystery,
    Romance,
    SciFi,
    Thriller,
    War,
    Western,
}

impl Genre {
    /// Every genre, in declaration order.
    ///
    /// Candidate predictors are generated from this list, so its order is also
    /// the tie-breaking order during predictor selection.
    pub const ALL: [Genre; 19] = [
        Genre::NoGenresListed,
        Genre::Action,
        Genre::Adventure,
        Genre::Animation,
        Genre::Children,
        Genre::Comedy,
        Genre::Crime,
        Genre::Documentary,
        Genre::Drama,
        Genre::Fantasy,
        Genre::FilmNoir,
        Genre::Horror,
        Genre::Musical,
        Genre::Mystery,
        Genre::Romance,
        Genre::SciFi,
        Genre::Thriller,
        Genre::War,
        Genre::Western,
    ];

    /// The genre's name as spelled in the MovieLens files.
    pub fn name(self) -> &'static str {
        match self {
            Genre::NoGenresListed => "(no genres listed)",
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Children => "Children's",
            Genre::Comedy => "Comedy",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Drama => "Drama",
            Genre::Fantasy => "Fantasy",
            Genre::FilmNoir => "Film-Noir",
            Genre::Horror => "Horror",
            Genre::Musical => "Musical",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::SciFi => "Sci-Fi",
            Genre::Thriller => "Thriller",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Genre {
    type Err = DataLoadError;

    /// Example: "Sci-Fi" -> Ok(Genre::SciFi)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .iter()
            .copied()
            .find(|genre| genre.name() == s)
            .ok_or_else(|| DataLoadError::InvalidValue {
                field: "genre".to_string(),
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Rating Types
// =============================================================================

/// A single rating from a user for a movie
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    /// Rating value from 0.5 to 5.0
    pub rating: f64,
    /// Unix timestamp when rating was made
    pub timestamp: i64,
}

/// A pair of ratings that one user has given to a pair of movies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingPair {
    pub user_id: UserId,
    pub rating_a: f64,
    pub rating_b: f64,
}

/// Precomputed statistics for a movie
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovieStats {
    pub avg_rating: f64,
    pub rating_count: u32,
}

// =============================================================================
// Derived Rows
// =============================================================================

/// The mean of all ratings a user has given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvgRating {
    pub user_id: UserId,
    pub avg_rating: f64,
}

/// The similarity score of an unordered pair of movies.
///
/// Always stored with `movie_a < movie_b`; use [`Similarity::new`] to build one
/// from an arbitrary orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    pub movie_a: MovieId,
    pub movie_b: MovieId,
    pub score: f64,
}

impl Similarity {
    /// Build a similarity in canonical (ascending) order.
    pub fn new(movie_a: MovieId, movie_b: MovieId, score: f64) -> Self {
        let (movie_a, movie_b) = canonical_pair(movie_a, movie_b);
        Self {
            movie_a,
            movie_b,
            score,
        }
    }
}

/// Order a pair of movie IDs ascending.
pub fn canonical_pair(a: MovieId, b: MovieId) -> (MovieId, MovieId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// The name of the regression predictor that works best for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorAssignment {
    pub user_id: UserId,
    pub predictor: String,
}

// =============================================================================
// DataIndex - raw rows
// =============================================================================

/// Main data structure that holds the imported dataset.
///
/// Raw rows never change after import, so the index is shared read-only
/// (typically behind an `Arc`) by every analysis worker.
#[derive(Debug, Default)]
pub struct DataIndex {
    pub(crate) movies: HashMap<MovieId, Movie>,

    /// All ratings made by each user
    pub(crate) user_ratings: HashMap<UserId, Vec<Rating>>,
    /// All ratings received by each movie
    pub(crate) movie_ratings: HashMap<MovieId, Vec<Rating>>,
    /// Point lookup of a single rating
    pub(crate) rating_lookup: HashMap<(UserId, MovieId), f64>,

    pub(crate) movie_stats: HashMap<MovieId, MovieStats>,
}

impl DataIndex {
    /// Creates a new, empty DataIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a movie by ID
    pub fn get_movie(&self, id: MovieId) -> Option<&Movie> {
        self.movies.get(&id)
    }

    /// Get all ratings made by a user. Empty if the user has no ratings.
    pub fn get_user_ratings(&self, user_id: UserId) -> &[Rating] {
        self.user_ratings
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get all ratings for a movie
    pub fn get_movie_ratings(&self, movie_id: MovieId) -> &[Rating] {
        self.movie_ratings
            .get(&movie_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get the rating a user gave to a movie
    pub fn get_rating(&self, user_id: UserId, movie_id: MovieId) -> Option<f64> {
        self.rating_lookup.get(&(user_id, movie_id)).copied()
    }

    /// Get precomputed statistics for a movie
    pub fn get_movie_stats(&self, movie_id: MovieId) -> Option<&MovieStats> {
        self.movie_stats.get(&movie_id)
    }

    /// IDs of every movie, ascending.
    pub fn get_all_movie_ids(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.movies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// IDs of every user with at least one rating, ascending.
    pub fn get_all_user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.user_ratings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Insert a movie into the index
    pub fn insert_movie(&mut self, movie: Movie) {
        self.movies.insert(movie.id, movie);
    }

    /// Insert a rating and update indices
    pub fn insert_rating(&mut self, rating: Rating) {
        self.user_ratings
            .entry(rating.user_id)
            .or_default()
            .push(rating);

        self.movie_ratings
            .entry(rating.movie_id)
            .or_default()
            .push(rating);

        self.rating_lookup
            .insert((rating.user_id, rating.movie_id), rating.rating);
    }

    /// Get counts for debugging/validation: (users, movies, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_ratings.values().map(|v| v.len()).sum();
        (self.user_ratings.len(), self.movies.len(), total_ratings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_is_canonical() {
        let sim = Similarity::new(9, 2, 0.25);
        assert_eq!((sim.movie_a, sim.movie_b), (2, 9));
        assert_eq!(sim.score, 0.25);
    }

    #[test]
    fn test_parse_genre_spellings() {
        assert_eq!("Sci-Fi".parse::<Genre>().unwrap(), Genre::SciFi);
        assert_eq!("Children's".parse::<Genre>().unwrap(), Genre::Children);
        assert_eq!(
            "(no genres listed)".parse::<Genre>().unwrap(),
            Genre::NoGenresListed
        );
        assert!("Bogus".parse::<Genre>().is_err());
    }
}
