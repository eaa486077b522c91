//! Movie requests forwarded to the catalog maintainers by email.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use cinevibes_core::mail::{dispatch_movie_request, MovieRequest};

use super::error::ApiError;
use super::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MovieRequestBody {
    #[serde(default)]
    pub title: String,
    pub year: Option<String>,
    #[serde(default)]
    pub user_email: String,
    pub additional_info: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MovieRequestResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Enrich the request with metadata when the title is found, then mail it.
///
/// Delivery problems are reported as a warning; the request itself succeeds.
pub async fn request_movie(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<MovieRequestBody>,
) -> Result<Json<MovieRequestResponse>, ApiError> {
    let title = body.title.trim().to_string();
    let user_email = body.user_email.trim().to_string();
    if title.is_empty() || user_email.is_empty() {
        return Err(ApiError::BadRequest(
            "Title and email are required".to_string(),
        ));
    }
    let year = non_empty(body.year);

    let metadata = match state
        .movies()
        .provider()
        .get_by_title(&title, year.as_deref())
        .await
    {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(title = %title, error = %e, "No metadata for requested movie");
            None
        }
    };

    let request = MovieRequest {
        title,
        year,
        user_email,
        additional_info: non_empty(body.additional_info),
        metadata,
    };
    info!(user_id = user.user_id, title = %request.title, "Movie requested");

    let warning = match state.mailer() {
        Some(mailer) => {
            match dispatch_movie_request(mailer, state.requests_recipient(), &request).await {
                Ok(()) => None,
                Err(_) => Some(
                    "Your request was received but the notification email could not be sent"
                        .to_string(),
                ),
            }
        }
        None => {
            warn!("No mailer configured, movie request not forwarded");
            Some("Email is not configured; the request was not forwarded".to_string())
        }
    };

    Ok(Json(MovieRequestResponse {
        success: true,
        message: format!("Request for \"{}\" submitted", request.title),
        warning,
    }))
}
