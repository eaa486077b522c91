//! Error responses for API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use cinevibes_core::accounts::AccountError;
use cinevibes_core::storage::{StorageError, UploadError};
use cinevibes_core::{MovieError, ReviewError};

/// Error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failed request, rendered as a status code and an [`ErrorResponse`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Upstream(String),

    /// Logged in full, reported generically.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn login_required() -> Self {
        ApiError::Unauthorized("Please log in to continue".to_string())
    }

    pub fn admin_required() -> Self {
        ApiError::Forbidden("Access denied. Admins only.".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Validation(msg) => ApiError::BadRequest(msg),
            AccountError::DuplicateEmail(_) => ApiError::Conflict(e.to_string()),
            AccountError::UnknownEmail | AccountError::WrongPassword => {
                ApiError::Unauthorized(e.to_string())
            }
            AccountError::NotVerified => ApiError::Forbidden(e.to_string()),
            AccountError::Hash(_) | AccountError::Database(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MovieError> for ApiError {
    fn from(e: MovieError) -> Self {
        match e {
            MovieError::NotFound(_) => ApiError::NotFound(e.to_string()),
            MovieError::Validation(msg) => ApiError::BadRequest(msg),
            MovieError::Provider(_) => ApiError::Upstream(e.to_string()),
            MovieError::Database(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::Validation(msg) => ApiError::BadRequest(msg),
            ReviewError::Database(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge(e.to_string()),
            UploadError::UnsupportedFormat | UploadError::NotAnImage => {
                ApiError::BadRequest(e.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidName(_) => ApiError::BadRequest(e.to_string()),
            StorageError::Http(_) | StorageError::Rejected { .. } => {
                error!("Avatar upload failed: {}", e);
                ApiError::Upstream("Could not store the profile picture".to_string())
            }
            StorageError::Io(_) => ApiError::Internal(e.to_string()),
        }
    }
}
