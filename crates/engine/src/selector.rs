//! Per-user predictor selection.
//!
//! ## Algorithm
//! For each movie the user rated, hold it out as a control: fit every
//! candidate predictor on the remaining movies, predict the control and add
//! the squared error to that candidate's total. Candidates that cannot
//! predict a control (no year, no points) skip it. The candidate with the
//! lowest total wins.

use crate::engine::{Engine, TableSink};
use crate::error::{EngineError, Result};
use crate::predictor::{PredictorKind, RegressionPredictor, UserHistory};
use data_loader::{AnalysisWriter, PredictorAssignment, RatingsReader, UserId};
use pipeline::{Reporter, RunSummary, Worker};
use tracing::{debug, info, instrument, warn};

/// Sum of squared errors of every candidate predictor for one user.
///
/// Returned in candidate order. The year predictor is always present, with
/// an infinite error if it never produced a prediction; a genre predictor
/// that never produced one is absent.
pub fn sum_squared_errors(history: &UserHistory) -> Result<Vec<(PredictorKind, f64)>> {
    let candidates: Vec<PredictorKind> = PredictorKind::candidates().collect();
    let mut sses: Vec<Option<f64>> = vec![None; candidates.len()];

    for (control, actual) in history.ratings() {
        for (kind, sse) in candidates.iter().zip(sses.iter_mut()) {
            let predictor = RegressionPredictor::fit(*kind, history, Some(control));
            let predicted = match predictor.predict_rated(history, control) {
                Ok(rating) => rating,
                Err(EngineError::NoMovieYear(_) | EngineError::EmptyGraph) => continue,
                Err(err) => return Err(err),
            };
            *sse.get_or_insert(0.0) += (predicted - actual).powi(2);
        }
    }

    Ok(candidates
        .into_iter()
        .zip(sses)
        .filter_map(|(kind, sse)| match (kind, sse) {
            (PredictorKind::Year, None) => Some((kind, f64::INFINITY)),
            (_, sse) => sse.map(|sse| (kind, sse)),
        })
        .collect())
}

/// Pick the predictor with the lowest error. Earlier candidates win ties.
pub fn min_sse(sses: &[(PredictorKind, f64)]) -> Option<(PredictorKind, f64)> {
    let mut best: Option<(PredictorKind, f64)> = None;
    for &(kind, sse) in sses {
        match best {
            Some((_, best_sse)) if sse >= best_sse => {}
            _ => best = Some((kind, sse)),
        }
    }
    best
}

/// Choose the best predictor for a user.
///
/// # Returns
/// * `Err(NoUsablePredictor)` - The user has no ratings, or every candidate
///   has an infinite error
pub fn select_predictor(history: &UserHistory) -> Result<PredictorKind> {
    if history.is_empty() {
        return Err(EngineError::NoUsablePredictor(history.user_id()));
    }
    debug!(user_id = history.user_id(), ratings = history.len(), "Scoring candidate predictors");
    let sses = sum_squared_errors(history)?;
    match min_sse(&sses) {
        Some((kind, sse)) if sse.is_finite() => {
            debug!(user_id = history.user_id(), sse = sse, "Selected predictor {}", kind);
            Ok(kind)
        }
        _ => Err(EngineError::NoUsablePredictor(history.user_id())),
    }
}

struct SelectionWorker<'a, R: ?Sized> {
    reader: &'a R,
}

impl<R: RatingsReader + ?Sized> Worker for SelectionWorker<'_, R> {
    type Arg = UserId;
    type Output = Option<PredictorAssignment>;
    type Error = EngineError;

    fn name(&self) -> &str {
        "predictor selection"
    }

    fn compute(&self, user_id: UserId) -> Result<Option<PredictorAssignment>> {
        let history = UserHistory::load(self.reader, user_id)?;
        match select_predictor(&history) {
            Ok(kind) => Ok(Some(PredictorAssignment {
                user_id,
                predictor: kind.to_string(),
            })),
            Err(EngineError::NoUsablePredictor(_)) => {
                warn!("No usable predictor for user {}; leaving unassigned", user_id);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

impl<S> Engine<'_, S>
where
    S: RatingsReader + AnalysisWriter + ?Sized,
{
    /// Select and store the best regression predictor for each user.
    ///
    /// Without `overwrite`, users who already have a predictor are skipped.
    #[instrument(skip(self, user_ids, reporter))]
    pub fn analyze_predictors(
        &self,
        user_ids: &[UserId],
        overwrite: bool,
        reporter: Option<Reporter>,
    ) -> Result<RunSummary> {
        let mut targets = user_ids.to_vec();
        if !overwrite {
            let done = self.store.users_with_predictor()?;
            targets.retain(|user_id| !done.contains(user_id));
        }
        info!("Selecting predictors for {} users", targets.len());

        let total = targets.len();
        let worker = SelectionWorker { reader: self.store };
        self.scheduler
            .run(targets, total, &worker, &mut TableSink::new(self.store), reporter)
    }
}
