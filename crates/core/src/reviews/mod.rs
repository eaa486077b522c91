//! User reviews of catalog movies.

mod controller;

pub use controller::ReviewController;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{DbError, Row};

/// Errors from review operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

/// A stored review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub movie_id: String,
    pub review_text: String,
    pub rating: i64,
    pub created_at: Option<String>,
}

impl Review {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            movie_id: row.get("movie_id")?,
            review_text: row.get("review_text")?,
            rating: row.get("rating")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A review on a movie page, with its author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieReview {
    pub id: i64,
    pub user_id: i64,
    pub user_nickname: String,
    pub user_profile_pic: Option<String>,
    pub review_text: String,
    pub rating: i64,
    pub created_at: Option<String>,
}

impl MovieReview {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            user_nickname: row.get("user_nickname")?,
            user_profile_pic: row.get("user_profile_pic")?,
            review_text: row.get("review_text")?,
            rating: row.get("rating")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A review on a profile page, with the movie it is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReview {
    pub id: i64,
    pub imdb_id: String,
    pub movie_title: String,
    pub movie_poster: Option<String>,
    pub review_text: String,
    pub rating: i64,
    pub created_at: Option<String>,
}

impl UserReview {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.get("id")?,
            imdb_id: row.get("movie_id")?,
            movie_title: row.get("movie_title")?,
            movie_poster: row.get("movie_poster")?,
            review_text: row.get("review_text")?,
            rating: row.get("rating")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Aggregate rating of one movie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieRating {
    pub review_count: u64,
    pub average_rating: Option<f64>,
}
