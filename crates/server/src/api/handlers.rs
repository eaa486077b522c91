use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use cinevibes_core::{Identity, SanitizedConfig};

use super::middleware::{AdminUser, MaybeUser};
use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus text exposition.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

#[derive(Serialize)]
pub struct NotFoundResponse {
    pub error: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

/// JSON 404 for unknown routes, carrying the current user when there is one.
pub async fn not_found(MaybeUser(user): MaybeUser, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Page not found".to_string(),
            path: uri.path().to_string(),
            user,
        }),
    )
}
