//! DataIndex building and indexing logic.
//!
//! Builds the DataIndex from parsed data:
//! - Primary indices (movies, ratings by user and by movie)
//! - Aggregate statistics per movie
//! - Integrity validation

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

impl DataIndex {
    /// Load a MovieLens dataset from a directory holding `movies.dat` and
    /// `ratings.dat`.
    pub fn load_from_files(data_dir: &Path) -> Result<Self> {
        info!("Loading MovieLens dataset from {:?}", data_dir);

        let movies_path = data_dir.join("movies.dat");
        let ratings_path = data_dir.join("ratings.dat");

        // The two files are independent, so parse them in parallel
        let (movies, ratings) = rayon::join(
            || parser::parse_movies(&movies_path),
            || parser::parse_ratings(&ratings_path),
        );
        let movies = movies?;
        let ratings = ratings?;

        info!("Parsed {} movies and {} ratings", movies.len(), ratings.len());

        let index = Self::from_rows(movies, ratings)?;
        let (users, movies, ratings) = index.counts();
        info!(users = users, movies = movies, ratings = ratings, "DataIndex built and validated");
        Ok(index)
    }

    /// Build and validate an index from already-parsed rows.
    pub fn from_rows(movies: Vec<Movie>, ratings: Vec<Rating>) -> Result<Self> {
        let mut index = DataIndex::new();
        for movie in movies {
            index.insert_movie(movie);
        }
        for rating in ratings {
            index.insert_rating(rating);
        }
        index.compute_movie_stats();
        index.validate()?;
        Ok(index)
    }

    /// Compute the average rating and rating count of every rated movie.
    pub fn compute_movie_stats(&mut self) {
        self.movie_stats = self
            .movie_ratings
            .par_iter()
            .map(|(&movie_id, ratings)| {
                let rating_count = ratings.len() as u32;
                let total: f64 = ratings.iter().map(|r| r.rating).sum();
                (
                    movie_id,
                    MovieStats {
                        avg_rating: total / rating_count as f64,
                        rating_count,
                    },
                )
            })
            .collect();
    }

    /// Validate data integrity
    ///
    /// Checks that:
    /// - Every rating references a known movie
    /// - Ratings lie in [MIN_RATING, MAX_RATING]
    /// - No user rated the same movie twice
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for ratings in self.user_ratings.values() {
            for rating in ratings {
                if !self.movies.contains_key(&rating.movie_id) {
                    return Err(DataLoadError::MissingReference {
                        entity: "Movie".to_string(),
                        id: rating.movie_id,
                    });
                }
                if !(MIN_RATING..=MAX_RATING).contains(&rating.rating) {
                    return Err(DataLoadError::InvalidValue {
                        field: "rating".to_string(),
                        value: rating.rating.to_string(),
                    });
                }
                if !seen.insert((rating.user_id, rating.movie_id)) {
                    return Err(DataLoadError::ValidationError(format!(
                        "user {} rated movie {} more than once",
                        rating.user_id, rating.movie_id
                    )));
                }
            }
        }
        Ok(())
    }
}
