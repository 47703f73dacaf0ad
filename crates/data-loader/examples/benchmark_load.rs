use data_loader::{DataIndex, RatingsReader, Store};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

fn main() {
    let data_dir = Path::new("data/ml-1m");

    println!("Importing MovieLens dataset from {}...\n", data_dir.display());

    let start = Instant::now();
    let index = DataIndex::load_from_files(data_dir).expect("Failed to load dataset");
    let elapsed = start.elapsed();

    let (users, movies, ratings) = index.counts();
    let store = Store::new(Arc::new(index));

    let start = Instant::now();
    let undated = store
        .all_movie_ids()
        .expect("Failed to list movies")
        .into_iter()
        .filter(|&id| matches!(store.year(id), Ok(None)))
        .count();
    let scan = start.elapsed();

    println!("=== Import Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Users: {}", users);
    println!("Movies: {} ({} without a release year)", movies, undated);
    println!("Ratings: {}", ratings);
    println!(
        "\nThroughput: {:.0} ratings/second",
        ratings as f64 / elapsed.as_secs_f64()
    );
    println!("Catalogue scan through the store: {:?}", scan);
}
