use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use super::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    #[serde(default)]
    pub review_text: String,
    #[serde(default)]
    pub rating: i64,
}

#[derive(Debug, Serialize)]
pub struct CreatedReview {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct ReviewResult {
    pub success: bool,
}

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(imdb_id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> Result<(StatusCode, Json<CreatedReview>), ApiError> {
    let id = state
        .reviews()
        .add_review(user.user_id, &imdb_id, &body.review_text, body.rating)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedReview { id })))
}

/// Owner-only edit. A missing or foreign review answers 400 `{success: false}`.
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(review_id): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Result<(StatusCode, Json<ReviewResult>), ApiError> {
    let updated = state
        .reviews()
        .update_review(review_id, user.user_id, &body.review_text, body.rating)
        .await?;
    Ok(outcome(updated))
}

pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(review_id): Path<i64>,
) -> Result<(StatusCode, Json<ReviewResult>), ApiError> {
    let deleted = state
        .reviews()
        .delete_review(review_id, user.user_id)
        .await?;
    Ok(outcome(deleted))
}

fn outcome(success: bool) -> (StatusCode, Json<ReviewResult>) {
    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(ReviewResult { success }))
}
