use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub imdb_id: String,
    pub title: String,
    pub year: Option<String>,
    /// "movie", "series", "episode" or "game".
    pub kind: String,
    pub poster: Option<String>,
}

impl MovieSummary {
    pub fn is_movie(&self) -> bool {
        self.kind.eq_ignore_ascii_case("movie")
    }
}

/// Full metadata for one title.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MovieMetadata {
    pub imdb_id: String,
    pub title: String,
    pub year: Option<String>,
    pub rated: Option<String>,
    /// Release date as sent by the provider, e.g. "14 Oct 1994".
    pub released: Option<String>,
    pub runtime: Option<String>,
    /// Comma-joined genres.
    pub genre: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub actors: Option<String>,
    pub plot: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub awards: Option<String>,
    pub poster: Option<String>,
    pub imdb_rating: Option<f64>,
    pub kind: Option<String>,
}

impl MovieMetadata {
    /// Release date normalized to ISO `YYYY-MM-DD` so it sorts chronologically.
    pub fn release_date_iso(&self) -> Option<String> {
        let released = self.released.as_deref()?.trim();
        ["%d %b %Y", "%Y-%m-%d", "%d %B %Y"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(released, fmt).ok())
            .map(|date| date.format("%Y-%m-%d").to_string())
    }

    pub fn genres(&self) -> Vec<String> {
        split_list(self.genre.as_deref())
    }
}

/// Split a comma-joined list, dropping empty items.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
