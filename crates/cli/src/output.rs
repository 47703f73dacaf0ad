//! Rendering of predictions for the terminal, CSV and JSON.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use data_loader::{MovieId, RatingsReader};
use engine::Prediction;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Format {
    #[default]
    Pretty,
    Csv,
    Json,
}

/// One recommendation as it is written out.
#[derive(Debug, Serialize)]
struct Row<'a> {
    rank: usize,
    movie_id: MovieId,
    title: &'a str,
    rating: f64,
    reason: &'static str,
}

/// Print a single prediction: "Predicted rating: X because ...".
pub fn print_prediction<R: RatingsReader + ?Sized>(reader: &R, prediction: &Prediction) -> Result<()> {
    let title = reader.title(prediction.movie_id)?;
    println!("{}", title.bold());
    println!(
        "Predicted rating: {} {}",
        format!("{:.2}", prediction.rating).green(),
        prediction.reason
    );
    Ok(())
}

fn rows<'a, R: RatingsReader + ?Sized>(
    reader: &'a R,
    predictions: &[Prediction],
) -> Result<Vec<Row<'a>>> {
    let mut rows = Vec::with_capacity(predictions.len());
    for (i, p) in predictions.iter().enumerate() {
        rows.push(Row {
            rank: i + 1,
            movie_id: p.movie_id,
            title: reader.title(p.movie_id)?,
            rating: p.rating,
            reason: p.reason.tag(),
        });
    }
    Ok(rows)
}

/// Print recommendations in the requested format, best first.
pub fn print_recommendations<R: RatingsReader + ?Sized>(
    reader: &R,
    predictions: &[Prediction],
    format: Format,
) -> Result<()> {
    let rows = rows(reader, predictions)?;
    let stdout = io::stdout();
    match format {
        Format::Pretty => {
            if rows.is_empty() {
                println!("{}", "No movies left to recommend.".yellow());
                return Ok(());
            }
            println!("{}", "Movie Recommendations:".bold().blue());
            for (row, prediction) in rows.iter().zip(predictions) {
                println!(
                    "{}. {} - {:.2}",
                    row.rank.to_string().green(),
                    row.title,
                    row.rating
                );
                println!("   {}", prediction.reason.explanation().dimmed());
            }
        }
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(stdout.lock());
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        Format::Json => {
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, &rows)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
