//! The storage gateway.
//!
//! Raw rows live in an immutable [`DataIndex`]. Analysis results (average
//! ratings, similarity scores, predictor assignments) live in tables behind a
//! single `RwLock`: any number of readers may proceed together, and a write
//! blocks every other access until the batch it carries is committed.
//!
//! Access is split into two traits. [`RatingsReader`] is what analysis workers
//! receive; [`AnalysisWriter`] is only ever called by whoever owns a batch
//! schedule. Holding a `&dyn RatingsReader` gives no way to write.

use crate::error::{StoreError, StoreResult};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Read access to ratings, movies and analysis results.
pub trait RatingsReader: Send + Sync {
    /// IDs of every user with at least one rating, ascending.
    fn users(&self) -> StoreResult<Vec<UserId>>;

    /// IDs of users whose average rating is stored.
    fn users_with_avg_rating(&self) -> StoreResult<HashSet<UserId>>;

    /// IDs of users with a stored predictor assignment.
    fn users_with_predictor(&self) -> StoreResult<HashSet<UserId>>;

    /// Every rating made by one user.
    fn user_ratings(&self, user_id: UserId) -> StoreResult<Vec<Rating>>;

    /// Every rating made by any of the given users.
    fn ratings(&self, user_ids: &[UserId]) -> StoreResult<Vec<Rating>>;

    fn rating(&self, user_id: UserId, movie_id: MovieId) -> StoreResult<f64>;

    /// The stored (precomputed) mean of a user's ratings.
    fn avg_rating(&self, user_id: UserId) -> StoreResult<f64>;

    fn count_avg_ratings(&self) -> StoreResult<usize>;

    /// Number of distinct users with ratings.
    fn count_users(&self) -> StoreResult<usize>;

    /// Mean of every rating a movie has received.
    fn avg_movie_rating(&self, movie_id: MovieId) -> StoreResult<f64>;

    /// Ratings given to both movies by the same user, one entry per user.
    fn rating_pairs(&self, movie_a: MovieId, movie_b: MovieId) -> StoreResult<Vec<RatingPair>>;

    fn count_rating_pairs(&self, movie_a: MovieId, movie_b: MovieId) -> StoreResult<usize>;

    /// Stored similarity for a pair, in either orientation.
    fn similarity(&self, movie_a: MovieId, movie_b: MovieId) -> StoreResult<f64>;

    /// Movies the user has rated whose stored similarity to `movie` is non-zero.
    fn similar_movies_for_user(
        &self,
        movie_id: MovieId,
        user_id: UserId,
    ) -> StoreResult<Vec<(MovieId, f64)>>;

    /// IDs of every movie, ascending.
    fn all_movie_ids(&self) -> StoreResult<Vec<MovieId>>;

    /// Movies rated by any of the given users.
    fn rated_movies(&self, user_ids: &[UserId]) -> StoreResult<BTreeSet<MovieId>>;

    /// Movies the user has not rated, ascending.
    fn unrated_movies(&self, user_id: UserId) -> StoreResult<Vec<MovieId>>;

    fn count_unrated_movies(&self, user_id: UserId) -> StoreResult<usize>;

    fn predictor_name(&self, user_id: UserId) -> StoreResult<String>;

    fn movie(&self, movie_id: MovieId) -> StoreResult<&Movie>;

    fn genres(&self, movie_id: MovieId) -> StoreResult<&[Genre]> {
        Ok(&self.movie(movie_id)?.genres)
    }

    fn title(&self, movie_id: MovieId) -> StoreResult<&str> {
        Ok(&self.movie(movie_id)?.title)
    }

    fn year(&self, movie_id: MovieId) -> StoreResult<Option<u16>> {
        Ok(self.movie(movie_id)?.year)
    }
}

/// Write access to the analysis tables.
///
/// Each call is one transaction: the whole batch becomes visible at once, or
/// none of it does.
pub trait AnalysisWriter {
    /// Insert or overwrite users' average ratings.
    fn write_avg_ratings(&self, batch: &[AvgRating]) -> StoreResult<()>;

    /// Insert or overwrite similarity scores. Pairs are stored in canonical order.
    fn write_similarities(&self, batch: &[Similarity]) -> StoreResult<()>;

    /// Insert or overwrite users' predictor assignments.
    fn write_predictors(&self, batch: &[PredictorAssignment]) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct AnalysisTables {
    avg_ratings: HashMap<UserId, f64>,
    /// Keyed by canonical (ascending) movie pair
    similarities: HashMap<(MovieId, MovieId), f64>,
    predictors: HashMap<UserId, String>,
}

/// Serializable copy of the analysis tables.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub avg_ratings: Vec<AvgRating>,
    pub similarities: Vec<Similarity>,
    pub predictors: Vec<PredictorAssignment>,
}

/// In-process storage gateway over a [`DataIndex`].
#[derive(Debug)]
pub struct Store {
    data: Arc<DataIndex>,
    tables: RwLock<AnalysisTables>,
}

impl Store {
    /// Create a store with empty analysis tables.
    pub fn new(data: Arc<DataIndex>) -> Self {
        Self {
            data,
            tables: RwLock::new(AnalysisTables::default()),
        }
    }

    /// The raw dataset.
    pub fn data(&self) -> &DataIndex {
        &self.data
    }

    fn read_tables(&self) -> StoreResult<RwLockReadGuard<'_, AnalysisTables>> {
        self.tables.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write_tables(&self) -> StoreResult<RwLockWriteGuard<'_, AnalysisTables>> {
        self.tables.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Copy the analysis tables, sorted by key so output is stable.
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        let tables = self.read_tables()?;

        let mut avg_ratings: Vec<AvgRating> = tables
            .avg_ratings
            .iter()
            .map(|(&user_id, &avg_rating)| AvgRating { user_id, avg_rating })
            .collect();
        avg_ratings.sort_unstable_by_key(|r| r.user_id);

        let mut similarities: Vec<Similarity> = tables
            .similarities
            .iter()
            .map(|(&(movie_a, movie_b), &score)| Similarity {
                movie_a,
                movie_b,
                score,
            })
            .collect();
        similarities.sort_unstable_by_key(|s| (s.movie_a, s.movie_b));

        let mut predictors: Vec<PredictorAssignment> = tables
            .predictors
            .iter()
            .map(|(&user_id, predictor)| PredictorAssignment {
                user_id,
                predictor: predictor.clone(),
            })
            .collect();
        predictors.sort_unstable_by_key(|p| p.user_id);

        Ok(Snapshot {
            avg_ratings,
            similarities,
            predictors,
        })
    }

    /// Replace the analysis tables with the contents of a snapshot.
    pub fn restore(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let mut tables = AnalysisTables::default();
        insert_avg_ratings(&mut tables, &snapshot.avg_ratings);
        insert_similarities(&mut tables, &snapshot.similarities)?;
        insert_predictors(&mut tables, &snapshot.predictors);
        *self.write_tables()? = tables;
        Ok(())
    }

    /// Write the analysis tables to a JSON file.
    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let snapshot = self.snapshot()?;
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &snapshot)?;
        info!(
            avg_ratings = snapshot.avg_ratings.len(),
            similarities = snapshot.similarities.len(),
            predictors = snapshot.predictors.len(),
            "Saved analysis snapshot to {:?}",
            path
        );
        Ok(())
    }

    /// Load analysis tables from a JSON file. A missing file leaves the tables empty.
    pub fn load_snapshot(&self, path: &Path) -> StoreResult<()> {
        if !path.exists() {
            debug!("No analysis snapshot at {:?}", path);
            return Ok(());
        }
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        self.restore(&snapshot)?;
        info!(
            avg_ratings = snapshot.avg_ratings.len(),
            similarities = snapshot.similarities.len(),
            predictors = snapshot.predictors.len(),
            "Loaded analysis snapshot from {:?}",
            path
        );
        Ok(())
    }
}

fn insert_avg_ratings(tables: &mut AnalysisTables, batch: &[AvgRating]) {
    for row in batch {
        tables.avg_ratings.insert(row.user_id, row.avg_rating);
    }
}

fn insert_similarities(tables: &mut AnalysisTables, batch: &[Similarity]) -> StoreResult<()> {
    // Reject the whole batch before touching the table
    if let Some(bad) = batch.iter().find(|s| s.movie_a == s.movie_b) {
        return Err(StoreError::SelfPair(bad.movie_a));
    }
    for row in batch {
        tables
            .similarities
            .insert(canonical_pair(row.movie_a, row.movie_b), row.score);
    }
    Ok(())
}

fn insert_predictors(tables: &mut AnalysisTables, batch: &[PredictorAssignment]) {
    for row in batch {
        tables.predictors.insert(row.user_id, row.predictor.clone());
    }
}

fn ensure_distinct(movie_a: MovieId, movie_b: MovieId) -> StoreResult<()> {
    if movie_a == movie_b {
        Err(StoreError::SelfPair(movie_a))
    } else {
        Ok(())
    }
}

impl RatingsReader for Store {
    fn users(&self) -> StoreResult<Vec<UserId>> {
        Ok(self.data.get_all_user_ids())
    }

    fn users_with_avg_rating(&self) -> StoreResult<HashSet<UserId>> {
        Ok(self.read_tables()?.avg_ratings.keys().copied().collect())
    }

    fn users_with_predictor(&self) -> StoreResult<HashSet<UserId>> {
        Ok(self.read_tables()?.predictors.keys().copied().collect())
    }

    fn user_ratings(&self, user_id: UserId) -> StoreResult<Vec<Rating>> {
        Ok(self.data.get_user_ratings(user_id).to_vec())
    }

    fn ratings(&self, user_ids: &[UserId]) -> StoreResult<Vec<Rating>> {
        Ok(user_ids
            .iter()
            .flat_map(|&user_id| self.data.get_user_ratings(user_id).iter().copied())
            .collect())
    }

    fn rating(&self, user_id: UserId, movie_id: MovieId) -> StoreResult<f64> {
        self.data
            .get_rating(user_id, movie_id)
            .ok_or(StoreError::MissingRating { user_id, movie_id })
    }

    fn avg_rating(&self, user_id: UserId) -> StoreResult<f64> {
        self.read_tables()?
            .avg_ratings
            .get(&user_id)
            .copied()
            .ok_or(StoreError::MissingAverageRating(user_id))
    }

    fn count_avg_ratings(&self) -> StoreResult<usize> {
        Ok(self.read_tables()?.avg_ratings.len())
    }

    fn count_users(&self) -> StoreResult<usize> {
        Ok(self.data.user_ratings.len())
    }

    fn avg_movie_rating(&self, movie_id: MovieId) -> StoreResult<f64> {
        self.data
            .get_movie_stats(movie_id)
            .map(|stats| stats.avg_rating)
            .ok_or(StoreError::NoMovieRatings(movie_id))
    }

    fn rating_pairs(&self, movie_a: MovieId, movie_b: MovieId) -> StoreResult<Vec<RatingPair>> {
        ensure_distinct(movie_a, movie_b)?;
        Ok(self
            .data
            .get_movie_ratings(movie_a)
            .iter()
            .filter_map(|a| {
                self.data
                    .get_rating(a.user_id, movie_b)
                    .map(|rating_b| RatingPair {
                        user_id: a.user_id,
                        rating_a: a.rating,
                        rating_b,
                    })
            })
            .collect())
    }

    fn count_rating_pairs(&self, movie_a: MovieId, movie_b: MovieId) -> StoreResult<usize> {
        ensure_distinct(movie_a, movie_b)?;
        // Walk the movie with fewer ratings
        let (small, other) = if self.data.get_movie_ratings(movie_a).len()
            <= self.data.get_movie_ratings(movie_b).len()
        {
            (movie_a, movie_b)
        } else {
            (movie_b, movie_a)
        };
        Ok(self
            .data
            .get_movie_ratings(small)
            .iter()
            .filter(|r| self.data.get_rating(r.user_id, other).is_some())
            .count())
    }

    fn similarity(&self, movie_a: MovieId, movie_b: MovieId) -> StoreResult<f64> {
        ensure_distinct(movie_a, movie_b)?;
        let key = canonical_pair(movie_a, movie_b);
        self.read_tables()?
            .similarities
            .get(&key)
            .copied()
            .ok_or(StoreError::MissingSimilarity(key.0, key.1))
    }

    fn similar_movies_for_user(
        &self,
        movie_id: MovieId,
        user_id: UserId,
    ) -> StoreResult<Vec<(MovieId, f64)>> {
        let tables = self.read_tables()?;
        Ok(self
            .data
            .get_user_ratings(user_id)
            .iter()
            .filter(|r| r.movie_id != movie_id)
            .filter_map(|r| {
                tables
                    .similarities
                    .get(&canonical_pair(movie_id, r.movie_id))
                    .filter(|&&score| score != 0.0)
                    .map(|&score| (r.movie_id, score))
            })
            .collect())
    }

    fn all_movie_ids(&self) -> StoreResult<Vec<MovieId>> {
        Ok(self.data.get_all_movie_ids())
    }

    fn rated_movies(&self, user_ids: &[UserId]) -> StoreResult<BTreeSet<MovieId>> {
        Ok(user_ids
            .iter()
            .flat_map(|&user_id| self.data.get_user_ratings(user_id))
            .map(|r| r.movie_id)
            .collect())
    }

    fn unrated_movies(&self, user_id: UserId) -> StoreResult<Vec<MovieId>> {
        Ok(self
            .data
            .get_all_movie_ids()
            .into_iter()
            .filter(|&movie_id| self.data.get_rating(user_id, movie_id).is_none())
            .collect())
    }

    fn count_unrated_movies(&self, user_id: UserId) -> StoreResult<usize> {
        let rated = self.data.get_user_ratings(user_id).len();
        Ok(self.data.movies.len().saturating_sub(rated))
    }

    fn predictor_name(&self, user_id: UserId) -> StoreResult<String> {
        self.read_tables()?
            .predictors
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NoPersonalizedPredictor(user_id))
    }

    fn movie(&self, movie_id: MovieId) -> StoreResult<&Movie> {
        self.data
            .get_movie(movie_id)
            .ok_or(StoreError::UnknownMovie(movie_id))
    }
}

impl AnalysisWriter for Store {
    fn write_avg_ratings(&self, batch: &[AvgRating]) -> StoreResult<()> {
        insert_avg_ratings(&mut *self.write_tables()?, batch);
        debug!("Committed {} average ratings", batch.len());
        Ok(())
    }

    fn write_similarities(&self, batch: &[Similarity]) -> StoreResult<()> {
        insert_similarities(&mut *self.write_tables()?, batch)?;
        debug!("Committed {} similarities", batch.len());
        Ok(())
    }

    fn write_predictors(&self, batch: &[PredictorAssignment]) -> StoreResult<()> {
        insert_predictors(&mut *self.write_tables()?, batch);
        debug!("Committed {} predictor assignments", batch.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> Store {
        let mut index = DataIndex::new();
        for id in 1..=4 {
            index.insert_movie(Movie {
                id,
                title: format!("Movie {} (199{})", id, id),
                year: Some(1990 + id as u16),
                genres: vec![Genre::Comedy],
            });
        }
        for (user_id, movie_id, rating) in [
            (1, 1, 4.0),
            (1, 2, 2.0),
            (1, 3, 5.0),
            (2, 1, 3.0),
            (2, 2, 3.5),
        ] {
            index.insert_rating(Rating {
                user_id,
                movie_id,
                rating,
                timestamp: 0,
            });
        }
        index.compute_movie_stats();
        Store::new(Arc::new(index))
    }

    #[test]
    fn test_similarity_either_orientation() {
        let store = create_test_store();
        store
            .write_similarities(&[Similarity::new(3, 1, 0.5)])
            .unwrap();

        assert_eq!(store.similarity(1, 3).unwrap(), 0.5);
        assert_eq!(store.similarity(3, 1).unwrap(), 0.5);
        assert_eq!(store.snapshot().unwrap().similarities.len(), 1);
    }

    #[test]
    fn test_similarity_upsert() {
        let store = create_test_store();
        store.write_similarities(&[Similarity::new(1, 2, 0.5)]).unwrap();
        store.write_similarities(&[Similarity::new(2, 1, -0.25)]).unwrap();
        assert_eq!(store.similarity(1, 2).unwrap(), -0.25);
        assert_eq!(store.snapshot().unwrap().similarities.len(), 1);
    }

    #[test]
    fn test_self_pairs_rejected() {
        let store = create_test_store();
        assert!(matches!(store.similarity(2, 2), Err(StoreError::SelfPair(2))));
        assert!(matches!(store.rating_pairs(2, 2), Err(StoreError::SelfPair(2))));
        assert!(matches!(store.count_rating_pairs(2, 2), Err(StoreError::SelfPair(2))));

        let bad_batch = [
            Similarity::new(1, 2, 0.1),
            Similarity {
                movie_a: 3,
                movie_b: 3,
                score: 1.0,
            },
        ];
        assert!(store.write_similarities(&bad_batch).is_err());
        // Nothing from the rejected batch was committed
        assert!(matches!(store.similarity(1, 2), Err(StoreError::MissingSimilarity(1, 2))));
    }

    #[test]
    fn test_rating_pairs() {
        let store = create_test_store();
        let pairs = store.rating_pairs(1, 2).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(store.count_rating_pairs(2, 1).unwrap(), 2);
        assert_eq!(store.count_rating_pairs(1, 3).unwrap(), 1);
        assert_eq!(store.count_rating_pairs(3, 4).unwrap(), 0);
    }

    #[test]
    fn test_similar_movies_skip_zero_scores() {
        let store = create_test_store();
        store
            .write_similarities(&[
                Similarity::new(4, 1, 0.9),
                Similarity::new(4, 2, 0.0),
                Similarity::new(3, 4, -0.3),
            ])
            .unwrap();

        let mut similar = store.similar_movies_for_user(4, 1).unwrap();
        similar.sort_by_key(|(movie_id, _)| *movie_id);
        assert_eq!(similar, vec![(1, 0.9), (3, -0.3)]);
    }

    #[test]
    fn test_missing_rows() {
        let store = create_test_store();
        assert!(matches!(store.avg_rating(1), Err(StoreError::MissingAverageRating(1))));
        assert!(matches!(
            store.predictor_name(1),
            Err(StoreError::NoPersonalizedPredictor(1))
        ));
        assert!(matches!(store.avg_movie_rating(4), Err(StoreError::NoMovieRatings(4))));
        assert!(matches!(store.title(42), Err(StoreError::UnknownMovie(42))));
    }

    #[test]
    fn test_unrated_movies() {
        let store = create_test_store();
        assert_eq!(store.unrated_movies(2).unwrap(), vec![3, 4]);
        assert_eq!(store.count_unrated_movies(2).unwrap(), 2);
        assert_eq!(store.count_users().unwrap(), 2);
    }

    #[test]
    fn test_snapshot_restores_into_fresh_store() {
        let store = create_test_store();
        store
            .write_avg_ratings(&[AvgRating {
                user_id: 1,
                avg_rating: 3.5,
            }])
            .unwrap();
        store
            .write_predictors(&[PredictorAssignment {
                user_id: 2,
                predictor: "year".to_string(),
            }])
            .unwrap();

        let path = std::env::temp_dir().join(format!("store-snapshot-{}.json", std::process::id()));
        store.save_snapshot(&path).unwrap();

        let fresh = create_test_store();
        fresh.load_snapshot(&path).unwrap();
        assert_eq!(fresh.avg_rating(1).unwrap(), 3.5);
        assert_eq!(fresh.predictor_name(2).unwrap(), "year");
        std::fs::remove_file(&path).unwrap();
    }
}
