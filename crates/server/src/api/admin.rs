//! Admin dashboard: catalog and user management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use cinevibes_core::accounts::{AccountError, AdminUserUpdate, UserSummary};
use cinevibes_core::movies::{Movie, MovieUpdate};
use cinevibes_core::{Page, Pagination};

use super::error::ApiError;
use super::middleware::AdminUser;
use crate::state::AppState;

/// Rows per dashboard table.
const DASHBOARD_PER_PAGE: u32 = 10;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub movie_page: Option<u32>,
    pub user_page: Option<u32>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub query: String,
    pub movies: Page<Movie>,
    pub users: Page<UserSummary>,
    pub total_movies: u64,
    pub total_available: u64,
    pub total_users: u64,
}

#[derive(Debug, Deserialize)]
pub struct AddMovieBody {
    #[serde(default)]
    pub imdb_id: String,
    #[serde(default)]
    pub available: bool,
    pub video_link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub movie: Movie,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

const SUCCESS: SuccessResponse = SuccessResponse { success: true };

// ============================================================================
// Handlers
// ============================================================================

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    let search = Some(query.as_str()).filter(|q| !q.is_empty());

    let movie_page = Pagination::new(params.movie_page.unwrap_or(1), DASHBOARD_PER_PAGE);
    let movies = state.movies().search_catalog(search, movie_page).await?;
    let movie_total = state.movies().count_catalog(search).await?;

    let user_page = Pagination::new(params.user_page.unwrap_or(1), DASHBOARD_PER_PAGE);
    let users = state.accounts().list_users(search, user_page).await?;
    let user_total = state.accounts().count_users(search).await?;

    Ok(Json(DashboardResponse {
        movies: Page::new(movies, movie_page, movie_total),
        users: Page::new(users, user_page, user_total),
        total_movies: state.queries().total_movies().await?,
        total_available: state.queries().total_available().await?,
        total_users: state.accounts().count_users(None).await?,
        query,
    }))
}

/// Fetch a movie from the metadata provider and add or replace it.
pub async fn add_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<AddMovieBody>,
) -> Result<(StatusCode, Json<MovieResponse>), ApiError> {
    let movie = state
        .movies()
        .add_movie_from_provider(&body.imdb_id, body.available, body.video_link)
        .await?;
    state.queries().invalidate_catalog().await;
    info!(admin = %admin.email, imdb_id = %movie.imdb_id, "Movie added");
    Ok((StatusCode::CREATED, Json(MovieResponse { movie })))
}

pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(imdb_id): Path<String>,
    Json(update): Json<MovieUpdate>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if !state.movies().update_movie(&imdb_id, &update).await? {
        return Err(ApiError::NotFound("Movie not found".to_string()));
    }
    state.queries().invalidate_catalog().await;
    info!(admin = %admin.email, imdb_id = %imdb_id, "Movie updated");
    Ok(Json(SUCCESS))
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(imdb_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if !state.movies().delete_movie(&imdb_id).await? {
        return Err(ApiError::NotFound("Movie not found".to_string()));
    }
    state.queries().invalidate_catalog().await;
    info!(admin = %admin.email, imdb_id = %imdb_id, "Movie deleted");
    Ok(Json(SUCCESS))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(update): Json<AdminUserUpdate>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if state.accounts().get_user_profile(user_id).await?.is_none() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    if !state.accounts().admin_update_user(user_id, &update).await? {
        return Err(AccountError::DuplicateEmail(update.email.trim().to_string()).into());
    }

    state.queries().invalidate_user(user_id).await;
    state.queries().invalidate_profiles().await;
    state
        .sessions()
        .refresh(&state.identity_for(user_id, update.email.trim(), update.nickname.trim()))
        .await;
    info!(admin = %admin.email, user_id, "User updated");
    Ok(Json(SUCCESS))
}

/// Delete a user with their content and end their sessions.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if !state.accounts().delete_user(user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    let revoked = state.sessions().revoke_user(user_id).await;
    state.queries().invalidate_user(user_id).await;
    info!(admin = %admin.email, user_id, revoked, "User deleted");
    Ok(Json(SUCCESS))
}
