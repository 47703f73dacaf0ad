//! Integration tests for the engine.
//!
//! These run every analysis against a small in-memory catalogue and then read
//! predictions and recommendations back through the public API.

use data_loader::{
    DataIndex, Genre, Movie, Rating, RatingsReader, Store, StoreError, MAX_RATING, MIN_RATING,
};
use engine::{
    personalized_predictor, predict_rating_for_display, recommend_personalized, Engine,
    EngineConfig, EngineError, Reason,
};
use std::sync::{Arc, Mutex};

fn movie(id: u32, title: &str, year: Option<u16>, genres: &[Genre]) -> Movie {
    Movie {
        id,
        title: title.to_string(),
        year,
        genres: genres.to_vec(),
    }
}

fn create_test_store() -> Store {
    let movies = vec![
        movie(1, "Toy Story (1995)", Some(1995), &[Genre::Animation, Genre::Children, Genre::Comedy]),
        movie(2, "Heat (1995)", Some(1995), &[Genre::Action, Genre::Crime, Genre::Thriller]),
        movie(3, "Casino (1995)", Some(1995), &[Genre::Crime, Genre::Drama]),
        movie(4, "Alien (1979)", Some(1979), &[Genre::Horror, Genre::SciFi]),
        movie(5, "Fargo (1996)", Some(1996), &[Genre::Crime, Genre::Drama, Genre::Thriller]),
        movie(6, "Matrix, The (1999)", Some(1999), &[Genre::Action, Genre::SciFi]),
    ];
    let rows = [
        (1, 1, 5.0),
        (1, 2, 3.0),
        (1, 3, 4.0),
        (1, 4, 2.0),
        (2, 1, 4.0),
        (2, 2, 5.0),
        (2, 4, 4.0),
        (2, 5, 3.0),
        (2, 6, 5.0),
        (3, 2, 2.0),
        (3, 3, 5.0),
        (3, 5, 4.5),
        (3, 6, 1.0),
        (4, 1, 1.0),
        (4, 3, 3.0),
        (4, 4, 5.0),
        (4, 6, 4.0),
    ];
    let ratings = rows
        .into_iter()
        .map(|(user_id, movie_id, rating)| Rating {
            user_id,
            movie_id,
            rating,
            timestamp: 978300760,
        })
        .collect();
    let index = DataIndex::from_rows(movies, ratings).unwrap();
    Store::new(Arc::new(index))
}

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_jobs(2)
        .with_jobs_per_worker_per_batch(2)
        .with_report_interval(3)
}

#[test]
fn test_item_item_flow() {
    let store = create_test_store();
    let engine = Engine::new(&store, config()).unwrap();

    let users = engine.analyze_users(false, None).unwrap();
    assert_eq!(users.items, 4);
    assert_eq!(store.count_avg_ratings().unwrap(), 4);
    assert!((store.avg_rating(1).unwrap() - 3.5).abs() < 1e-9);

    let summary = engine.analyze_movies(&[], &[1], false, None).unwrap();
    assert!(summary.items > 0);

    // User 1 has not rated movies 5 and 6
    for movie_id in [5, 6] {
        let prediction = predict_rating_for_display(&store, 1, movie_id).unwrap();
        assert!(prediction.rating >= MIN_RATING && prediction.rating <= MAX_RATING);
        assert_ne!(prediction.reason, Reason::Personalized);
    }

    let picks = engine.recommend_similar(1, 5, None).unwrap();
    let rated = store.rated_movies(&[1]).unwrap();
    assert_eq!(picks.len(), 2);
    assert!(picks.iter().all(|p| !rated.contains(&p.movie_id)));
    assert!(picks.windows(2).all(|w| w[0].rating >= w[1].rating));

    let top = engine.recommend_similar(1, 1, None).unwrap();
    assert_eq!(top, picks[..1].to_vec());
}

#[test]
fn test_similarities_need_averages() {
    let store = create_test_store();
    let engine = Engine::new(&store, config()).unwrap();

    let err = engine.analyze_movies(&[1], &[], false, None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Store(StoreError::MissingAverageRating(_))
    ));
}

#[test]
fn test_personalized_flow() {
    let store = create_test_store();
    let engine = Engine::new(&store, config()).unwrap();
    let users = store.users().unwrap();

    engine.analyze_predictors(&users, false, None).unwrap();
    assert_eq!(store.users_with_predictor().unwrap().len(), users.len());

    let kind = personalized_predictor(&store, 3, None).unwrap();
    let picks = recommend_personalized(&store, 3, 10, kind).unwrap();
    // User 3 has not rated movies 1 and 4, and both have a year
    assert_eq!(picks.len(), 2);
    assert!(picks.iter().all(|p| p.reason == Reason::Personalized));
}

#[test]
fn test_progress_reaches_completion() {
    let store = create_test_store();
    let engine = Engine::new(&store, config()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let reporter = pipeline::reporter(move |fraction| sink.lock().unwrap().push(fraction));
    engine.analyze_users(false, Some(reporter)).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.last(), Some(&1.0));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_snapshot_survives_restart() {
    let path = std::env::temp_dir().join(format!("engine-snapshot-{}.json", std::process::id()));

    let store = create_test_store();
    let engine = Engine::new(&store, config()).unwrap();
    engine.analyze_users(false, None).unwrap();
    engine.analyze_movies(&[2], &[], false, None).unwrap();
    store.save_snapshot(&path).unwrap();

    let restarted = create_test_store();
    restarted.load_snapshot(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restarted.count_avg_ratings().unwrap(), 4);
    assert_eq!(
        restarted.similarity(2, 3).unwrap(),
        store.similarity(2, 3).unwrap()
    );

    // Nothing left to do without overwrite
    let engine = Engine::new(&restarted, config()).unwrap();
    let again = engine.analyze_movies(&[2], &[], false, None).unwrap();
    assert_eq!(again.items, 0);

    // A missing snapshot leaves the tables untouched
    restarted.load_snapshot(&path).unwrap();
    assert_eq!(restarted.count_avg_ratings().unwrap(), 4);
}
