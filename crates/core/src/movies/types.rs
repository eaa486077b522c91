use serde::{Deserialize, Serialize};

use crate::db::{DbError, Row};
use crate::metadata::MovieMetadata;

/// A row of the local `movies` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub imdb_id: String,
    pub title: String,
    pub year: Option<String>,
    pub poster: Option<String>,
    pub plot: Option<String>,
    pub director: Option<String>,
    pub actors: Option<String>,
    pub genres: Option<String>,
    pub imdb_rating: Option<f64>,
    pub release_date: Option<String>,
    pub runtime: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub awards: Option<String>,
    pub available: bool,
    pub video_link: Option<String>,
}

impl Movie {
    pub(crate) fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.get("id")?,
            imdb_id: row.get("imdb_id")?,
            title: row.get("title")?,
            year: row.get("year")?,
            poster: row.get("poster")?,
            plot: row.get("plot")?,
            director: row.get("director")?,
            actors: row.get("actors")?,
            genres: row.get("genres")?,
            imdb_rating: row.get("imdb_rating")?,
            release_date: row.get("release_date")?,
            runtime: row.get("runtime")?,
            language: row.get("language")?,
            country: row.get("country")?,
            awards: row.get("awards")?,
            available: row.get::<Option<bool>>("available")?.unwrap_or(false),
            video_link: row.get("video_link")?,
        })
    }

    /// Playable when a link is set or the row is flagged available.
    pub fn is_available(&self) -> bool {
        self.video_link.is_some() || self.available
    }
}

/// Remote metadata merged with the local availability override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub imdb_id: String,
    pub title: String,
    pub year: Option<String>,
    pub poster: Option<String>,
    pub imdb_rating: Option<f64>,
    pub director: Option<String>,
    pub runtime: Option<String>,
    pub plot: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub awards: Option<String>,
    pub actors: Option<String>,
    pub genre: Option<String>,
    pub is_available: bool,
    pub video_link: Option<String>,
}

impl MovieDetails {
    pub fn merge(imdb_id: &str, meta: MovieMetadata, local: Option<&LocalOverride>) -> Self {
        let video_link = local.and_then(|l| l.video_link.clone());
        let available = local.is_some_and(|l| l.available);
        Self {
            imdb_id: imdb_id.to_string(),
            title: meta.title,
            year: meta.year,
            poster: meta.poster,
            imdb_rating: meta.imdb_rating,
            director: meta.director,
            runtime: meta.runtime,
            plot: meta.plot,
            language: meta.language,
            country: meta.country,
            awards: meta.awards,
            actors: meta.actors,
            genre: meta.genre,
            is_available: video_link.is_some() || available,
            video_link,
        }
    }
}

/// Local-only fields that override remote metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalOverride {
    pub available: bool,
    pub video_link: Option<String>,
}

/// A remote search result flagged against the local catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub imdb_id: String,
    pub title: String,
    pub year: Option<String>,
    pub poster: Option<String>,
    pub is_available: bool,
}

/// A lightweight card for the browse page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieCard {
    pub imdb_id: String,
    pub title: String,
    pub year: Option<String>,
    pub poster: String,
}

/// Optional filters for personal recommendations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationFilter {
    pub genre: Option<String>,
    pub actor: Option<String>,
    pub director: Option<String>,
}

/// Values for the recommendation form.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationOptions {
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub directors: Vec<String>,
}

/// A movie to insert or replace, keyed by `imdb_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub imdb_id: String,
    pub title: String,
    pub year: Option<String>,
    pub poster: Option<String>,
    pub plot: Option<String>,
    pub director: Option<String>,
    pub actors: Option<String>,
    pub genres: Option<String>,
    pub imdb_rating: Option<f64>,
    pub release_date: Option<String>,
    pub runtime: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub awards: Option<String>,
    pub available: bool,
    pub video_link: Option<String>,
}

impl NewMovie {
    pub fn from_metadata(meta: &MovieMetadata, available: bool, video_link: Option<String>) -> Self {
        Self {
            imdb_id: meta.imdb_id.clone(),
            title: meta.title.clone(),
            year: meta.year.clone(),
            poster: meta.poster.clone(),
            plot: meta.plot.clone(),
            director: meta.director.clone(),
            actors: meta.actors.clone(),
            genres: meta.genre.clone(),
            imdb_rating: meta.imdb_rating,
            release_date: meta.release_date_iso(),
            runtime: meta.runtime.clone(),
            language: meta.language.clone(),
            country: meta.country.clone(),
            awards: meta.awards.clone(),
            available,
            video_link: video_link.filter(|l| !l.trim().is_empty()),
        }
    }
}

/// Admin edit of a catalog row. A missing title keeps the current one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieUpdate {
    pub title: Option<String>,
    #[serde(default)]
    pub available: bool,
    pub video_link: Option<String>,
}
