mod output;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use data_loader::{DataIndex, MovieId, RatingsReader, Store, UserId};
use engine::{
    personalized_predictor, predict_rating_for_display, predict_with_regression,
    recommend_personalized, Engine, EngineConfig,
};
use output::Format;
use pipeline::{Progress, Reporter, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// movie-rec - MovieLens rating prediction and recommendation
#[derive(Parser)]
#[command(name = "movie-rec")]
#[command(about = "Predict ratings and recommend movies from MovieLens data", long_about = None)]
struct Cli {
    /// Path to MovieLens dataset directory
    #[arg(short, long, default_value = "data/ml-1m")]
    data_dir: PathBuf,

    /// Analysis snapshot file [default: <DATA_DIR>/analysis.json]
    #[arg(long)]
    state: Option<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis and save its results
    Analyze {
        #[command(subcommand)]
        method: AnalyzeMethod,
    },

    /// Predict how a user would rate a movie
    Predict {
        #[command(subcommand)]
        method: PredictMethod,
    },

    /// Recommend unrated movies to a user
    Recommend {
        #[command(subcommand)]
        method: RecommendMethod,
    },
}

#[derive(Subcommand)]
enum AnalyzeMethod {
    /// Item-item: user average ratings, then movie similarities
    Ii {
        /// Movies to compute similarities for
        #[arg(short = 'm', long = "movie")]
        movies: Vec<MovieId>,

        /// Users whose rated movies get similarities
        #[arg(short = 'u', long = "user")]
        users: Vec<UserId>,

        #[command(flatten)]
        run: RunArgs,

        /// Recompute results that are already stored
        #[arg(long)]
        overwrite: bool,
    },

    /// Regression: select the best predictor for each user
    Ml {
        /// Users to select predictors for [default: all users]
        #[arg(short = 'u', long = "user")]
        users: Vec<UserId>,

        #[command(flatten)]
        run: RunArgs,

        /// Recompute results that are already stored
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Subcommand)]
enum PredictMethod {
    /// Weighted sum over similar movies the user rated
    Ii { user_id: UserId, movie_id: MovieId },

    /// The user's regression predictor
    Ml {
        user_id: UserId,
        movie_id: MovieId,

        /// Predictor to use instead of the stored one, e.g. "year" or "genre:Drama"
        #[arg(long)]
        predictor: Option<String>,
    },
}

#[derive(Subcommand)]
enum RecommendMethod {
    /// Rank unrated movies by weighted-sum prediction
    Ii {
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(long, default_value = "5")]
        count: usize,

        #[command(flatten)]
        run: RunArgs,

        #[arg(long, value_enum, default_value_t)]
        format: Format,
    },

    /// Rank unrated movies with the user's regression predictor
    Ml {
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(long, default_value = "5")]
        count: usize,

        /// Predictor to use instead of the stored one
        #[arg(long)]
        predictor: Option<String>,

        #[arg(long, value_enum, default_value_t)]
        format: Format,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Worker threads [default: available parallelism]
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Do not print progress to stderr
    #[arg(long)]
    no_progress: bool,
}

impl RunArgs {
    fn apply(&self, config: EngineConfig) -> EngineConfig {
        match self.jobs {
            Some(jobs) => config.with_jobs(jobs),
            None => config,
        }
    }

    fn reporter(&self, label: &'static str) -> Option<Reporter> {
        (!self.no_progress).then(|| progress_reporter(label))
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so CSV and JSON output stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let state = cli
        .state
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("analysis.json"));

    eprintln!("Loading MovieLens dataset from {}...", cli.data_dir.display());
    let start = Instant::now();
    let index = DataIndex::load_from_files(&cli.data_dir)
        .context("Failed to load MovieLens dataset")?;
    let store = Store::new(Arc::new(index));
    store
        .load_snapshot(&state)
        .with_context(|| format!("Failed to load analysis state from {}", state.display()))?;
    eprintln!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());

    match cli.command {
        Commands::Analyze { method } => handle_analyze(&store, config, &state, method),
        Commands::Predict { method } => handle_predict(&store, method),
        Commands::Recommend { method } => handle_recommend(&store, config, method),
    }
}

/// Handle the 'analyze' commands. Results are saved after every stage.
fn handle_analyze(
    store: &Store,
    config: EngineConfig,
    state: &Path,
    method: AnalyzeMethod,
) -> Result<()> {
    match method {
        AnalyzeMethod::Ii {
            movies,
            users,
            run,
            overwrite,
        } => {
            movies.iter().try_for_each(|&id| ensure_movie(store, id))?;
            users.iter().try_for_each(|&id| ensure_user(store, id))?;
            let engine = Engine::new(store, run.apply(config))?;

            let summary = engine.analyze_users(overwrite, run.reporter("Average ratings"))?;
            print_summary("average ratings", &summary);
            save_state(store, state)?;

            let movies = if movies.is_empty() && users.is_empty() {
                store.all_movie_ids()?
            } else {
                movies
            };
            let summary =
                engine.analyze_movies(&movies, &users, overwrite, run.reporter("Similarities"))?;
            print_summary("similarities", &summary);
            save_state(store, state)
        }
        AnalyzeMethod::Ml {
            users,
            run,
            overwrite,
        } => {
            users.iter().try_for_each(|&id| ensure_user(store, id))?;
            let users = if users.is_empty() {
                store.users()?
            } else {
                users
            };
            let engine = Engine::new(store, run.apply(config))?;

            let summary =
                engine.analyze_predictors(&users, overwrite, run.reporter("Predictors"))?;
            print_summary("predictor selections", &summary);
            save_state(store, state)
        }
    }
}

/// Handle the 'predict' commands
fn handle_predict(store: &Store, method: PredictMethod) -> Result<()> {
    let prediction = match method {
        PredictMethod::Ii { user_id, movie_id } => {
            ensure_user(store, user_id)?;
            ensure_movie(store, movie_id)?;
            predict_rating_for_display(store, user_id, movie_id)?
        }
        PredictMethod::Ml {
            user_id,
            movie_id,
            predictor,
        } => {
            ensure_user(store, user_id)?;
            ensure_movie(store, movie_id)?;
            let kind = personalized_predictor(store, user_id, predictor.as_deref())
                .context("No predictor for this user; run `analyze ml` or pass --predictor")?;
            debug!("Predicting with {}", kind);
            predict_with_regression(store, user_id, movie_id, kind)?
        }
    };
    output::print_prediction(store, &prediction)
}

/// Handle the 'recommend' commands
fn handle_recommend(store: &Store, config: EngineConfig, method: RecommendMethod) -> Result<()> {
    match method {
        RecommendMethod::Ii {
            user_id,
            count,
            run,
            format,
        } => {
            ensure_user(store, user_id)?;
            let engine = Engine::new(store, run.apply(config))?;
            let picks = engine.recommend_similar(user_id, count, run.reporter("Ranking"))?;
            output::print_recommendations(store, &picks, format)
        }
        RecommendMethod::Ml {
            user_id,
            count,
            predictor,
            format,
        } => {
            ensure_user(store, user_id)?;
            let kind = personalized_predictor(store, user_id, predictor.as_deref())
                .context("No predictor for this user; run `analyze ml` or pass --predictor")?;
            debug!("Ranking with {}", kind);
            let picks = recommend_personalized(store, user_id, count, kind)?;
            output::print_recommendations(store, &picks, format)
        }
    }
}

fn ensure_user(store: &Store, user_id: UserId) -> Result<()> {
    if store.data().get_user_ratings(user_id).is_empty() {
        bail!("User {} not found", user_id);
    }
    Ok(())
}

fn ensure_movie(store: &Store, movie_id: MovieId) -> Result<()> {
    store
        .movie(movie_id)
        .with_context(|| format!("Movie {} not found", movie_id))?;
    Ok(())
}

fn save_state(store: &Store, state: &Path) -> Result<()> {
    store
        .save_snapshot(state)
        .with_context(|| format!("Failed to save analysis state to {}", state.display()))
}

fn print_summary(what: &str, summary: &RunSummary) {
    eprintln!(
        "{} Computed {} {} in {} batches ({:?})",
        "✓".green(),
        summary.items,
        what,
        summary.batches,
        summary.elapsed
    );
}

/// Overwrite one stderr line with the completed percentage.
fn progress_reporter(label: &'static str) -> Reporter {
    Box::new(move |rx: Receiver<Progress>| {
        for message in rx {
            match message {
                Progress::Fraction(fraction) => {
                    eprint!("\r\x1b[K{}: {:>5.1}%", label, fraction * 100.0)
                }
                Progress::Done => {
                    eprintln!("\r\x1b[K{}: 100.0%", label);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_ii_flags() {
        let cli = Cli::try_parse_from([
            "movie-rec", "analyze", "ii", "-m", "1", "-m", "2", "-u", "7", "-j", "4", "--overwrite",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                method:
                    AnalyzeMethod::Ii {
                        movies,
                        users,
                        run,
                        overwrite,
                    },
            } => {
                assert_eq!(movies, vec![1, 2]);
                assert_eq!(users, vec![7]);
                assert_eq!(run.jobs, Some(4));
                assert!(overwrite);
            }
            _ => panic!("expected analyze ii"),
        }
    }

    #[test]
    fn test_recommend_ml_defaults() {
        let cli = Cli::try_parse_from(["movie-rec", "recommend", "ml", "12"]).unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("data/ml-1m"));
        match cli.command {
            Commands::Recommend {
                method:
                    RecommendMethod::Ml {
                        user_id,
                        count,
                        predictor,
                        format,
                    },
            } => {
                assert_eq!(user_id, 12);
                assert_eq!(count, 5);
                assert!(predictor.is_none());
                assert!(matches!(format, Format::Pretty));
            }
            _ => panic!("expected recommend ml"),
        }
    }
}
