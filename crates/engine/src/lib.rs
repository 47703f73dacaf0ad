//! # Engine Crate
//!
//! Rating prediction and recommendation over the MovieLens data.
//!
//! ## Components
//!
//! ### Item-item collaborative filtering
//! - Average-rating analysis: every user's mean rating
//! - Similarity analysis: adjusted cosine similarity between movie pairs
//! - Weighted-sum prediction from the similarities a user can reach
//!
//! ### Personalized regression
//! - Least-squares line fitting (`graph`)
//! - Year and genre predictors fitted per user
//! - Leave-one-out selection of each user's best predictor
//!
//! ### Recommendation
//! - Bounded top-N selection over every unrated movie
//!
//! Heavy analyses go through [`Engine`], which owns a batch scheduler and
//! commits results to the store one batch at a time.
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataIndex, Store};
//! use engine::{Engine, EngineConfig};
//! use std::sync::Arc;
//!
//! let store = Store::new(Arc::new(DataIndex::load_from_files("data/ml-1m".as_ref())?));
//! let engine = Engine::new(&store, EngineConfig::default())?;
//!
//! engine.analyze_users(false, None)?;
//! engine.analyze_movies(&[], &[1], false, None)?;
//! let picks = engine.recommend_similar(1, 5, None)?;
//! ```

pub mod average;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod prediction;
pub mod predictor;
pub mod recommend;
pub mod selector;
pub mod similarity;
pub mod weighted_sum;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use graph::{Graph, Point};
pub use prediction::{Prediction, Reason};
pub use predictor::{
    personalized_predictor, predict_with_regression, PredictorKind, RegressionPredictor,
    UserHistory,
};
pub use recommend::{recommend_personalized, TopN};
pub use selector::select_predictor;
pub use weighted_sum::{predict_rating, predict_rating_for_display, predict_rating_for_ranking};

#[cfg(test)]
pub(crate) mod test_support {
    use data_loader::{DataIndex, Genre, Movie, Rating, Store};
    use std::sync::Arc;

    /// Six movies and four users.
    ///
    /// | movie | title          | genres         |
    /// |-------|----------------|----------------|
    /// | 1     | Alpha (1990)   | Comedy         |
    /// | 2     | Beta (1995)    | Comedy, Drama  |
    /// | 3     | Gamma (2000)   | Drama          |
    /// | 4     | Delta (2005)   | Action         |
    /// | 5     | Untitled       | Comedy         |
    /// | 6     | Epsilon (2010) | Horror         |
    ///
    /// Movie 6 is unrated.
    pub fn create_test_index() -> DataIndex {
        let mut index = DataIndex::new();
        let movies = [
            (1, "Alpha (1990)", Some(1990), vec![Genre::Comedy]),
            (2, "Beta (1995)", Some(1995), vec![Genre::Comedy, Genre::Drama]),
            (3, "Gamma (2000)", Some(2000), vec![Genre::Drama]),
            (4, "Delta (2005)", Some(2005), vec![Genre::Action]),
            (5, "Untitled", None, vec![Genre::Comedy]),
            (6, "Epsilon (2010)", Some(2010), vec![Genre::Horror]),
        ];
        for (id, title, year, genres) in movies {
            index.insert_movie(Movie {
                id,
                title: title.to_string(),
                year,
                genres,
            });
        }

        let ratings = [
            (1, 1, 5.0),
            (1, 2, 4.0),
            (1, 3, 1.0),
            (2, 1, 4.0),
            (2, 2, 5.0),
            (2, 4, 2.0),
            (3, 2, 2.0),
            (3, 3, 4.0),
            (3, 4, 5.0),
            (3, 5, 3.0),
            (4, 1, 3.0),
            (4, 4, 3.5),
        ];
        for (user_id, movie_id, rating) in ratings {
            index.insert_rating(Rating {
                user_id,
                movie_id,
                rating,
                timestamp: 1000000,
            });
        }
        index.compute_movie_stats();
        index
    }

    pub fn create_test_store() -> Store {
        Store::new(Arc::new(create_test_index()))
    }
}
