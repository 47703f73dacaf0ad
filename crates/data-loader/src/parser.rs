//! Parser for MovieLens data files.
//!
//! Handles the `::`-delimited `.dat` files:
//! - movies.dat: movieId::title::genres
//! - ratings.dat: userId::movieId::rating::timestamp
//!
//! Both files are ISO-8859-1 encoded.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Read a file with ISO-8859-1 encoding (Latin-1).
///
/// Every Latin-1 byte maps directly to the Unicode code point of the same value.
fn read_lines_latin1(path: &Path) -> Result<Vec<String>> {
    let mut file = File::open(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(err),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let content: String = bytes.iter().map(|&b| b as char).collect();

    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Pull the next `::`-separated field off a line.
fn next_field<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    file: &str,
    line: usize,
    name: &str,
) -> Result<&'a str> {
    parts.next().ok_or_else(|| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Missing {}", name),
    })
}

/// Parse a field into a number, reporting the file position on failure.
fn parse_field<T>(value: &str, file: &str, line: usize, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Invalid {}: {}", name, e),
    })
}

/// Parse the movies.dat file
///
/// The title usually includes the year in parentheses: "Toy Story (1995)".
/// Genres are pipe-separated: "Animation|Children's|Comedy".
pub fn parse_movies(path: &Path) -> Result<Vec<Movie>> {
    const FILE: &str = "movies.dat";
    let lines = read_lines_latin1(path)?;
    let mut movies = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }

        let mut parts = line_trimmed.split("::");
        let movie_id = next_field(&mut parts, FILE, line_no, "movieId")?;
        let title = next_field(&mut parts, FILE, line_no, "title")?;
        let genres = next_field(&mut parts, FILE, line_no, "genres")?;

        movies.push(Movie {
            id: parse_field(movie_id, FILE, line_no, "movieId")?,
            title: title.to_string(),
            year: extract_year_from_title(title),
            genres: parse_genres(genres)?,
        });
    }
    Ok(movies)
}

/// Parse the ratings.dat file
pub fn parse_ratings(path: &Path) -> Result<Vec<Rating>> {
    const FILE: &str = "ratings.dat";
    let lines = read_lines_latin1(path)?;
    let mut ratings = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }

        let mut parts = line_trimmed.split("::");
        let user_id = next_field(&mut parts, FILE, line_no, "userId")?;
        let movie_id = next_field(&mut parts, FILE, line_no, "movieId")?;
        let rating = next_field(&mut parts, FILE, line_no, "rating")?;
        let timestamp = next_field(&mut parts, FILE, line_no, "timestamp")?;

        ratings.push(Rating {
            user_id: parse_field(user_id, FILE, line_no, "userId")?,
            movie_id: parse_field(movie_id, FILE, line_no, "movieId")?,
            rating: parse_field(rating, FILE, line_no, "rating")?,
            timestamp: parse_field(timestamp, FILE, line_no, "timestamp")?,
        });
    }
    Ok(ratings)
}

/// Extract the release year from a movie title.
///
/// The year is the first parenthesized group of exactly four digits, so
/// "Seven (a.k.a. Se7en) (1995)" yields 1995 and "Movie Title" yields `None`.
pub fn extract_year_from_title(title: &str) -> Option<u16> {
    let bytes = title.as_bytes();
    bytes.windows(6).find_map(|w| {
        let digits = &w[1..5];
        if w[0] == b'(' && w[5] == b')' && digits.iter().all(u8::is_ascii_digit) {
            std::str::from_utf8(digits).ok()?.parse().ok()
        } else {
            None
        }
    })
}

/// Parse pipe-separated genres
///
/// Example: "Action|Adventure|Sci-Fi" -> vec![Genre::Action, Genre::Adventure, Genre::SciFi]
fn parse_genres(s: &str) -> Result<Vec<Genre>> {
    s.split('|').map(Genre::from_str).collect()
}
