//! Top-N recommendation.
//!
//! Both recommenders stream a prediction for every movie the user has not
//! rated into a bounded min-heap, so memory stays at N no matter how many
//! movies are scored.

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::prediction::{Prediction, Reason};
use crate::predictor::{PredictorKind, RegressionPredictor, UserHistory};
use crate::weighted_sum::predict_rating_for_ranking;
use data_loader::{AnalysisWriter, MovieId, RatingsReader, UserId};
use pipeline::{BatchSink, Reporter, Worker};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::{debug, info, instrument};

/// An item ordered by its score alone.
struct Ranked<T> {
    score: f64,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.score.total_cmp(&other.score) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score)
    }
}

/// Keeps the N highest-scoring items pushed into it.
pub struct TopN<T> {
    capacity: usize,
    // Min-heap: the root is the weakest item kept so far
    heap: BinaryHeap<Reverse<Ranked<T>>>,
}

impl<T> TopN<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Offer an item. It is kept if there is room or it beats the weakest one.
    pub fn push(&mut self, score: f64, item: T) {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(Ranked { score, item }));
        } else if let Some(mut weakest) = self.heap.peek_mut() {
            if score > weakest.0.score {
                *weakest = Reverse(Ranked { score, item });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a vector, highest score first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        // Ascending order of Reverse is descending order of score
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| ranked.item)
            .collect()
    }
}

impl BatchSink<Prediction> for TopN<Prediction> {
    type Error = EngineError;

    fn flush(&mut self, batch: Vec<Prediction>) -> Result<()> {
        for prediction in batch {
            self.push(prediction.rating, prediction);
        }
        Ok(())
    }
}

struct RankingWorker<'a, R: ?Sized> {
    reader: &'a R,
    user_id: UserId,
}

impl<R: RatingsReader + ?Sized> Worker for RankingWorker<'_, R> {
    type Arg = MovieId;
    type Output = Prediction;
    type Error = EngineError;

    fn name(&self) -> &str {
        "item-item recommendations"
    }

    fn compute(&self, movie_id: MovieId) -> Result<Prediction> {
        predict_rating_for_ranking(self.reader, self.user_id, movie_id)
    }
}

impl<S> Engine<'_, S>
where
    S: RatingsReader + AnalysisWriter + ?Sized,
{
    /// Recommend up to `count` unrated movies by weighted-sum prediction.
    ///
    /// Movies without similar rated movies score MIN_RATING and only fill the
    /// list when nothing better exists.
    #[instrument(skip(self, reporter))]
    pub fn recommend_similar(
        &self,
        user_id: UserId,
        count: usize,
        reporter: Option<Reporter>,
    ) -> Result<Vec<Prediction>> {
        let total = self.store.count_unrated_movies(user_id)?;
        let unrated = self.store.unrated_movies(user_id)?;
        info!("Ranking {} unrated movies for user {}", total, user_id);

        let worker = RankingWorker {
            reader: self.store,
            user_id,
        };
        let mut top = TopN::new(count);
        self.scheduler
            .run::<_, _, _, EngineError>(unrated, total, &worker, &mut top, reporter)?;
        Ok(top.into_sorted_vec())
    }
}

/// Recommend up to `count` unrated movies with a regression predictor.
///
/// Runs on the calling thread. Movies the predictor cannot handle for lack of
/// a release year are skipped.
#[instrument(skip(reader))]
pub fn recommend_personalized<R: RatingsReader + ?Sized>(
    reader: &R,
    user_id: UserId,
    count: usize,
    kind: PredictorKind,
) -> Result<Vec<Prediction>> {
    let history = UserHistory::load(reader, user_id)?;
    let predictor = RegressionPredictor::fit(kind, &history, None);

    let mut top = TopN::new(count);
    let mut skipped = 0usize;
    for movie_id in reader.unrated_movies(user_id)? {
        match predictor.predict_movie(reader, movie_id) {
            Ok(rating) => top.push(rating, Prediction::new(rating, movie_id, Reason::Personalized)),
            Err(EngineError::NoMovieYear(_)) => skipped += 1,
            Err(err) => return Err(err),
        }
    }
    debug!("Skipped {} movies without a release year", skipped);
    Ok(top.into_sorted_vec())
}
