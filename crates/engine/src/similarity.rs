//! Item-item similarity analysis.
//!
//! ## Algorithm
//! Adjusted cosine similarity: for every user who rated both movies, subtract
//! the user's average rating from each of their two ratings, then take the
//! cosine of the angle between the two resulting vectors:
//!
//! ```text
//! sim(a, b) = Σ (r_a - avg) (r_b - avg) / (sqrt(Σ (r_a - avg)²) sqrt(Σ (r_b - avg)²))
//! ```
//!
//! Pairs with fewer co-ratings than the configured minimum score 0, as do
//! pairs where every contributing rating equals its user's average.

use crate::engine::{Engine, TableSink};
use crate::error::{EngineError, Result};
use data_loader::{
    AnalysisWriter, MovieId, RatingsReader, Similarity, StoreError, StoreResult, UserId,
};
use pipeline::{Reporter, RunSummary, Worker};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Compute the adjusted cosine similarity of two movies.
///
/// Requires the average rating of every user who rated both movies.
pub fn adjusted_cosine<R: RatingsReader + ?Sized>(
    reader: &R,
    movie_a: MovieId,
    movie_b: MovieId,
    min_pairs: usize,
) -> Result<f64> {
    if reader.count_rating_pairs(movie_a, movie_b)? < min_pairs {
        return Ok(0.0);
    }

    let mut numerator = 0.0;
    let mut sum_sq_a = 0.0;
    let mut sum_sq_b = 0.0;
    for pair in reader.rating_pairs(movie_a, movie_b)? {
        let avg = reader.avg_rating(pair.user_id)?;
        let dev_a = pair.rating_a - avg;
        let dev_b = pair.rating_b - avg;
        numerator += dev_a * dev_b;
        sum_sq_a += dev_a * dev_a;
        sum_sq_b += dev_b * dev_b;
    }

    let denominator = sum_sq_a.sqrt() * sum_sq_b.sqrt();
    if denominator == 0.0 {
        return Ok(0.0);
    }
    // Rounding can push the ratio a hair past ±1
    Ok((numerator / denominator).clamp(-1.0, 1.0))
}

/// Lazily enumerate the (candidate, target) pairs that need a score.
///
/// Skips a movie paired with itself, the second orientation of a pair whose
/// members are both targets, and, unless `overwrite`, pairs already scored.
/// A failed lookup of an existing score is yielded as an error item.
pub(crate) fn candidate_pairs<'a, R: RatingsReader + ?Sized>(
    reader: &'a R,
    all_movies: &'a [MovieId],
    targets: &'a BTreeSet<MovieId>,
    overwrite: bool,
) -> impl Iterator<Item = StoreResult<(MovieId, MovieId)>> + 'a {
    all_movies.iter().flat_map(move |&movie| {
        targets.iter().filter_map(move |&target| {
            if movie == target || (movie > target && targets.contains(&movie)) {
                return None;
            }
            if overwrite {
                return Some(Ok((movie, target)));
            }
            match reader.similarity(movie, target) {
                Ok(_) => None,
                Err(StoreError::MissingSimilarity(..)) => Some(Ok((movie, target))),
                Err(err) => Some(Err(err)),
            }
        })
    })
}

struct SimilarityWorker<'a, R: ?Sized> {
    reader: &'a R,
    min_pairs: usize,
}

impl<R: RatingsReader + ?Sized> Worker for SimilarityWorker<'_, R> {
    type Arg = StoreResult<(MovieId, MovieId)>;
    type Output = Similarity;
    type Error = EngineError;

    fn name(&self) -> &str {
        "movie similarities"
    }

    fn compute(&self, pair: StoreResult<(MovieId, MovieId)>) -> Result<Similarity> {
        let (movie_a, movie_b) = pair?;
        let score = adjusted_cosine(self.reader, movie_a, movie_b, self.min_pairs)?;
        Ok(Similarity::new(movie_a, movie_b, score))
    }
}

impl<S> Engine<'_, S>
where
    S: RatingsReader + AnalysisWriter + ?Sized,
{
    /// Compute and store similarities between target movies and every movie.
    ///
    /// Targets are `movie_ids` plus every movie rated by `user_ids`. Average
    /// ratings must already be stored for all users.
    #[instrument(skip(self, movie_ids, user_ids, reporter))]
    pub fn analyze_movies(
        &self,
        movie_ids: &[MovieId],
        user_ids: &[UserId],
        overwrite: bool,
        reporter: Option<Reporter>,
    ) -> Result<RunSummary> {
        self.ensure_avg_ratings()?;

        let mut targets: BTreeSet<MovieId> = movie_ids.iter().copied().collect();
        targets.extend(self.store.rated_movies(user_ids)?);
        let all_movies = self.store.all_movie_ids()?;
        let total = all_movies.len() * targets.len();
        info!(
            targets = targets.len(),
            movies = all_movies.len(),
            "Computing movie similarities"
        );

        let worker = SimilarityWorker {
            reader: self.store,
            min_pairs: self.config.min_pairs_for_similarity,
        };
        let pairs = candidate_pairs(self.store, &all_movies, &targets, overwrite);
        self.scheduler
            .run(pairs, total, &worker, &mut TableSink::new(self.store), reporter)
    }

    /// Fail unless every user with ratings has a stored average.
    fn ensure_avg_ratings(&self) -> Result<()> {
        let stored = self.store.count_avg_ratings()?;
        let users = self.store.count_users()?;
        debug!(stored = stored, users = users, "Checking average ratings");
        if stored >= users {
            return Ok(());
        }
        let done = self.store.users_with_avg_rating()?;
        match self
            .store
            .users()?
            .into_iter()
            .find(|user_id| !done.contains(user_id))
        {
            Some(user_id) => Err(StoreError::MissingAverageRating(user_id).into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::test_support::create_test_store;
    use data_loader::{
        AvgRating, Movie, PredictorAssignment, Rating, RatingPair, Store,
    };
    use std::collections::HashSet;

    /// A store whose similarity table cannot be read.
    struct UnreadableSimilarities(Store);

    impl RatingsReader for UnreadableSimilarities {
        fn users(&self) -> StoreResult<Vec<UserId>> {
            self.0.users()
        }
        fn users_with_avg_rating(&self) -> StoreResult<HashSet<UserId>> {
            self.0.users_with_avg_rating()
        }
        fn users_with_predictor(&self) -> StoreResult<HashSet<UserId>> {
            self.0.users_with_predictor()
        }
        fn user_ratings(&self, user_id: UserId) -> StoreResult<Vec<Rating>> {
            self.0.user_ratings(user_id)
        }
        fn ratings(&self, user_ids: &[UserId]) -> StoreResult<Vec<Rating>> {
            self.0.ratings(user_ids)
        }
        fn rating(&self, user_id: UserId, movie_id: MovieId) -> StoreResult<f64> {
            self.0.rating(user_id, movie_id)
        }
        fn avg_rating(&self, user_id: UserId) -> StoreResult<f64> {
            self.0.avg_rating(user_id)
        }
        fn count_avg_ratings(&self) -> StoreResult<usize> {
            self.0.count_avg_ratings()
        }
        fn count_users(&self) -> StoreResult<usize> {
            self.0.count_users()
        }
        fn avg_movie_rating(&self, movie_id: MovieId) -> StoreResult<f64> {
            self.0.avg_movie_rating(movie_id)
        }
        fn rating_pairs(&self, a: MovieId, b: MovieId) -> StoreResult<Vec<RatingPair>> {
            self.0.rating_pairs(a, b)
        }
        fn count_rating_pairs(&self, a: MovieId, b: MovieId) -> StoreResult<usize> {
            self.0.count_rating_pairs(a, b)
        }
        fn similarity(&self, _a: MovieId, _b: MovieId) -> StoreResult<f64> {
            Err(StoreError::LockPoisoned)
        }
        fn similar_movies_for_user(
            &self,
            movie_id: MovieId,
            user_id: UserId,
        ) -> StoreResult<Vec<(MovieId, f64)>> {
            self.0.similar_movies_for_user(movie_id, user_id)
        }
        fn all_movie_ids(&self) -> StoreResult<Vec<MovieId>> {
            self.0.all_movie_ids()
        }
        fn rated_movies(&self, user_ids: &[UserId]) -> StoreResult<BTreeSet<MovieId>> {
            self.0.rated_movies(user_ids)
        }
        fn unrated_movies(&self, user_id: UserId) -> StoreResult<Vec<MovieId>> {
            self.0.unrated_movies(user_id)
        }
        fn count_unrated_movies(&self, user_id: UserId) -> StoreResult<usize> {
            self.0.count_unrated_movies(user_id)
        }
        fn predictor_name(&self, user_id: UserId) -> StoreResult<String> {
            self.0.predictor_name(user_id)
        }
        fn movie(&self, movie_id: MovieId) -> StoreResult<&Movie> {
            self.0.movie(movie_id)
        }
    }

    impl AnalysisWriter for UnreadableSimilarities {
        fn write_avg_ratings(&self, batch: &[AvgRating]) -> StoreResult<()> {
            self.0.write_avg_ratings(batch)
        }
        fn write_similarities(&self, batch: &[Similarity]) -> StoreResult<()> {
            self.0.write_similarities(batch)
        }
        fn write_predictors(&self, batch: &[PredictorAssignment]) -> StoreResult<()> {
            self.0.write_predictors(batch)
        }
    }

    fn analyzed_store() -> Store {
        let store = create_test_store();
        let engine = Engine::new(&store, EngineConfig::default().with_jobs(2)).unwrap();
        engine.analyze_users(false, None).unwrap();
        store
    }

    #[test]
    fn test_requires_average_ratings() {
        let store = create_test_store();
        let engine = Engine::new(&store, EngineConfig::default().with_jobs(1)).unwrap();
        let err = engine.analyze_movies(&[1], &[], false, None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Store(StoreError::MissingAverageRating(_))
        ));
    }

    #[test]
    fn test_scores_are_symmetric_and_bounded() {
        let store = analyzed_store();
        let engine = Engine::new(&store, EngineConfig::default().with_jobs(2)).unwrap();
        let all = store.all_movie_ids().unwrap();
        engine.analyze_movies(&all, &[], true, None).unwrap();

        let n = all.len();
        assert_eq!(store.snapshot().unwrap().similarities.len(), n * (n - 1) / 2);
        for &a in &all {
            for &b in &all {
                if a == b {
                    continue;
                }
                let score = store.similarity(a, b).unwrap();
                assert_eq!(score, store.similarity(b, a).unwrap());
                assert!((-1.0..=1.0).contains(&score));
            }
        }
    }

    #[test]
    fn test_hand_computed_score() {
        let store = analyzed_store();
        // Users 1 and 2 rated both movie 1 and movie 2
        // user 1: avg 10/3, ratings 5.0 and 4.0
        // user 2: avg 11/3, ratings 4.0 and 5.0
        let (u1a, u1b): (f64, f64) = (5.0 - 10.0 / 3.0, 4.0 - 10.0 / 3.0);
        let (u2a, u2b): (f64, f64) = (4.0 - 11.0 / 3.0, 5.0 - 11.0 / 3.0);
        let expected = (u1a * u1b + u2a * u2b)
            / ((u1a * u1a + u2a * u2a).sqrt() * (u1b * u1b + u2b * u2b).sqrt());

        let score = adjusted_cosine(&store, 1, 2, 1).unwrap();
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_below_threshold_scores_zero() {
        let store = analyzed_store();
        // Movies 1 and 2 share two raters
        assert_eq!(adjusted_cosine(&store, 1, 2, 3).unwrap(), 0.0);
        // Movies 1 and 5 share no raters at all
        assert_eq!(adjusted_cosine(&store, 1, 5, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_zero_denominator_scores_zero() {
        let store = create_test_store();
        let flat: Vec<AvgRating> = [(1, 5.0), (2, 4.0), (3, 2.0), (4, 3.0)]
            .into_iter()
            .map(|(user_id, avg_rating)| AvgRating { user_id, avg_rating })
            .collect();
        store.write_avg_ratings(&flat).unwrap();
        // Users 1 and 2 rate movie 1 exactly at their stored average
        assert_eq!(adjusted_cosine(&store, 1, 2, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_pair_generation_skips_mirrored_targets() {
        let store = analyzed_store();
        let all = store.all_movie_ids().unwrap();
        let targets: BTreeSet<MovieId> = [2, 4].into_iter().collect();

        let pairs: Vec<_> = candidate_pairs(&store, &all, &targets, false)
            .collect::<StoreResult<_>>()
            .unwrap();
        assert!(pairs.iter().all(|(a, b)| a != b));
        // (2, 4) is generated, (4, 2) is not
        assert!(pairs.contains(&(2, 4)));
        assert!(!pairs.contains(&(4, 2)));
        // 6 candidates x 2 targets, minus 2 self pairs and 1 mirrored pair
        assert_eq!(pairs.len(), 9);
    }

    #[test]
    fn test_rerun_without_overwrite_skips_stored_pairs() {
        let store = analyzed_store();
        let engine = Engine::new(&store, EngineConfig::default().with_jobs(2)).unwrap();

        let first = engine.analyze_movies(&[3], &[], false, None).unwrap();
        assert_eq!(first.items, 5);
        let second = engine.analyze_movies(&[3], &[], false, None).unwrap();
        assert_eq!(second.items, 0);

        // Targets from a user's ratings: user 4 rated movies 1 and 4
        let by_user = engine.analyze_movies(&[], &[4], false, None).unwrap();
        // 12 pairs, minus 2 self pairs, mirrored (4, 1), and stored (3, 1) and (3, 4)
        assert_eq!(by_user.items, 12 - 2 - 1 - 2);
    }

    #[test]
    fn test_unreadable_similarities_fail_the_run() {
        let store = UnreadableSimilarities(analyzed_store());
        let engine = Engine::new(&store, EngineConfig::default().with_jobs(2)).unwrap();

        let err = engine.analyze_movies(&[3], &[], false, None).unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::LockPoisoned)));
        assert!(store.0.snapshot().unwrap().similarities.is_empty());

        // With overwrite nothing is looked up, so the run goes through
        let summary = engine.analyze_movies(&[3], &[], true, None).unwrap();
        assert_eq!(summary.items, 5);
    }

    #[test]
    fn test_overwrite_recomputes_identical_scores() {
        let store = analyzed_store();
        let engine = Engine::new(&store, EngineConfig::default().with_jobs(3)).unwrap();
        let all = store.all_movie_ids().unwrap();

        engine.analyze_movies(&all, &[], false, None).unwrap();
        let before = store.snapshot().unwrap().similarities;

        let redo = engine.analyze_movies(&all, &[], true, None).unwrap();
        assert_eq!(redo.items, before.len());
        let after = store.snapshot().unwrap().similarities;
        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(&after) {
            assert_eq!((old.movie_a, old.movie_b), (new.movie_a, new.movie_b));
            assert_eq!(old.score.to_bits(), new.score.to_bits());
        }
    }
}
