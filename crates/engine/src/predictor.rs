//! Univariate regression predictors.
//!
//! A predictor fits a line through (feature, rating) points drawn from the
//! movies a user has rated, then reads a prediction off that line. The
//! feature is either the movie's release year or a 0/1 flag for one genre.

use crate::error::{EngineError, Result};
use crate::graph::{Graph, Point};
use crate::prediction::{Prediction, Reason};
use data_loader::{Genre, MovieId, RatingsReader, UserId, MAX_RATING, MIN_RATING};
use std::fmt;
use std::str::FromStr;

/// The feature a regression predictor is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictorKind {
    Year,
    Genre(Genre),
}

impl PredictorKind {
    /// Every candidate predictor: the year first, then one per genre.
    pub fn candidates() -> impl Iterator<Item = PredictorKind> {
        std::iter::once(PredictorKind::Year).chain(Genre::ALL.into_iter().map(PredictorKind::Genre))
    }

    /// The feature value for a movie, or `None` when the movie lacks it.
    fn feature(self, year: Option<u16>, genres: &[Genre]) -> Option<f64> {
        match self {
            PredictorKind::Year => year.map(f64::from),
            PredictorKind::Genre(genre) => Some(if genres.contains(&genre) { 1.0 } else { 0.0 }),
        }
    }
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictorKind::Year => f.write_str("year"),
            PredictorKind::Genre(genre) => write!(f, "genre:{}", genre),
        }
    }
}

impl FromStr for PredictorKind {
    type Err = EngineError;

    /// Example: "genre:Sci-Fi" -> Ok(PredictorKind::Genre(Genre::SciFi))
    fn from_str(s: &str) -> Result<Self> {
        if s == "year" {
            return Ok(PredictorKind::Year);
        }
        s.strip_prefix("genre:")
            .and_then(|name| name.parse::<Genre>().ok())
            .map(PredictorKind::Genre)
            .ok_or_else(|| EngineError::NoSuchPredictor(s.to_string()))
    }
}

/// Clamp a rating to [MIN_RATING, MAX_RATING].
pub fn clamp_rating(rating: f64) -> f64 {
    rating.clamp(MIN_RATING, MAX_RATING)
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    movie_id: MovieId,
    rating: f64,
    year: Option<u16>,
    genres: Vec<Genre>,
}

/// A user's ratings joined with the movie features predictors need.
///
/// Fetched once per user, then reused for every predictor fitted for them.
#[derive(Debug, Clone)]
pub struct UserHistory {
    user_id: UserId,
    entries: Vec<HistoryEntry>,
}

impl UserHistory {
    pub fn load<R: RatingsReader + ?Sized>(reader: &R, user_id: UserId) -> Result<Self> {
        let entries = reader
            .user_ratings(user_id)?
            .into_iter()
            .map(|r| -> Result<HistoryEntry> {
                let movie = reader.movie(r.movie_id)?;
                Ok(HistoryEntry {
                    movie_id: r.movie_id,
                    rating: r.rating,
                    year: movie.year,
                    genres: movie.genres.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { user_id, entries })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rated movie IDs, each with the user's rating.
    pub fn ratings(&self) -> impl Iterator<Item = (MovieId, f64)> + '_ {
        self.entries.iter().map(|e| (e.movie_id, e.rating))
    }

    fn entry(&self, movie_id: MovieId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.movie_id == movie_id)
    }
}

/// A fitted regression predictor for one user.
#[derive(Debug, Clone)]
pub struct RegressionPredictor {
    kind: PredictorKind,
    graph: Graph,
}

impl RegressionPredictor {
    /// Fit a predictor on a user's history, leaving out `exclude` if given.
    ///
    /// Movies lacking the feature contribute no point.
    pub fn fit(kind: PredictorKind, history: &UserHistory, exclude: Option<MovieId>) -> Self {
        let points = history
            .entries
            .iter()
            .filter(|e| Some(e.movie_id) != exclude)
            .filter_map(|e| {
                kind.feature(e.year, &e.genres)
                    .map(|x| Point::new(x, e.rating))
            })
            .collect();
        Self {
            kind,
            graph: Graph::new(points),
        }
    }

    pub fn kind(&self) -> PredictorKind {
        self.kind
    }

    /// Predict a rating for a movie with the given features.
    ///
    /// A vertical line falls back to the mean rating of the fitted points.
    ///
    /// # Returns
    /// * `Err(NoMovieYear)` - Year predictor and the movie has no year
    /// * `Err(EmptyGraph)` - No rated movie had the feature
    pub fn predict(&self, movie_id: MovieId, year: Option<u16>, genres: &[Genre]) -> Result<f64> {
        let x = self
            .kind
            .feature(year, genres)
            .ok_or(EngineError::NoMovieYear(movie_id))?;
        let y = match self.graph.predict_y(x) {
            Ok(y) => y,
            Err(EngineError::VerticalLine) => self
                .graph
                .mean_point()
                .map(|p| p.y)
                .ok_or(EngineError::EmptyGraph)?,
            Err(err) => return Err(err),
        };
        Ok(clamp_rating(y))
    }

    /// Predict a rating for a movie, looking up its features.
    pub fn predict_movie<R: RatingsReader + ?Sized>(
        &self,
        reader: &R,
        movie_id: MovieId,
    ) -> Result<f64> {
        let movie = reader.movie(movie_id)?;
        self.predict(movie_id, movie.year, &movie.genres)
    }

    /// Predict the rating of a movie the user has rated, from the history.
    pub(crate) fn predict_rated(&self, history: &UserHistory, movie_id: MovieId) -> Result<f64> {
        match history.entry(movie_id) {
            Some(e) => self.predict(movie_id, e.year, &e.genres),
            None => Err(EngineError::Store(data_loader::StoreError::MissingRating {
                user_id: history.user_id,
                movie_id,
            })),
        }
    }
}

/// The predictor to use for a user: `requested` if given, else the stored one.
pub fn personalized_predictor<R: RatingsReader + ?Sized>(
    reader: &R,
    user_id: UserId,
    requested: Option<&str>,
) -> Result<PredictorKind> {
    match requested {
        Some(name) => name.parse(),
        None => reader.predictor_name(user_id)?.parse(),
    }
}

/// Predict one rating with a user's regression predictor.
pub fn predict_with_regression<R: RatingsReader + ?Sized>(
    reader: &R,
    user_id: UserId,
    movie_id: MovieId,
    kind: PredictorKind,
) -> Result<Prediction> {
    let history = UserHistory::load(reader, user_id)?;
    let predictor = RegressionPredictor::fit(kind, &history, None);
    let rating = predictor.predict_movie(reader, movie_id)?;
    Ok(Prediction::new(rating, movie_id, Reason::Personalized))
}
