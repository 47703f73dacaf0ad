//! Average-rating analysis.
//!
//! Every user's mean rating is precomputed and stored, since the similarity
//! formula subtracts it from each of that user's ratings.

use crate::engine::{Engine, TableSink};
use crate::error::{EngineError, Result};
use data_loader::{AnalysisWriter, AvgRating, Rating, RatingsReader, UserId};
use pipeline::{Reporter, RunSummary, Worker};
use tracing::{info, instrument};

/// Mean of a set of ratings, or `None` when there are none.
pub fn mean_rating(ratings: &[Rating]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let total: f64 = ratings.iter().map(|r| r.rating).sum();
    Some(total / ratings.len() as f64)
}

struct AvgRatingWorker<'a, R: ?Sized> {
    reader: &'a R,
}

impl<R: RatingsReader + ?Sized> Worker for AvgRatingWorker<'_, R> {
    type Arg = UserId;
    type Output = AvgRating;
    type Error = EngineError;

    fn name(&self) -> &str {
        "average ratings"
    }

    fn compute(&self, user_id: UserId) -> Result<AvgRating> {
        let ratings = self.reader.user_ratings(user_id)?;
        let avg_rating = mean_rating(&ratings).ok_or(EngineError::NoUserRatings(user_id))?;
        Ok(AvgRating {
            user_id,
            avg_rating,
        })
    }
}

impl<S> Engine<'_, S>
where
    S: RatingsReader + AnalysisWriter + ?Sized,
{
    /// Compute and store the average rating of users.
    ///
    /// With `overwrite`, every user with ratings is recomputed; otherwise only
    /// users without a stored average are.
    #[instrument(skip(self, reporter))]
    pub fn analyze_users(&self, overwrite: bool, reporter: Option<Reporter>) -> Result<RunSummary> {
        let mut targets = self.store.users()?;
        if !overwrite {
            let done = self.store.users_with_avg_rating()?;
            targets.retain(|user_id| !done.contains(user_id));
        }
        info!("Computing average ratings for {} users", targets.len());

        let total = targets.len();
        let worker = AvgRatingWorker { reader: self.store };
        self.scheduler
            .run(targets, total, &worker, &mut TableSink::new(self.store), reporter)
    }
}
