//! Browsing, search, movie pages and recommendations.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use cinevibes_core::movies::{
    Movie, MovieCard, MovieDetails, RecommendationFilter, RecommendationOptions, SearchHit,
};
use cinevibes_core::reviews::{MovieRating, MovieReview};
use cinevibes_core::{Page, Pagination};

use super::error::ApiError;
use super::middleware::CurrentUser;
use crate::state::AppState;

/// Movies per page on the home listing.
const HOME_PER_PAGE: u32 = 6;
const AVAILABLE_PER_PAGE: u32 = 12;
const MAX_PER_PAGE: u32 = 50;
/// Random picks shown when the search box is empty.
const EMPTY_SEARCH_PICKS: u32 = 16;
const TOP_ACTORS: usize = 100;
const TOP_DIRECTORS: usize = 50;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub realtime: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    /// Filled only when the query is empty.
    pub recommendations: Vec<MovieCard>,
}

#[derive(Debug, Serialize)]
pub struct MovieDetailsResponse {
    pub movie: MovieDetails,
    pub reviews: Vec<MovieReview>,
    pub rating: MovieRating,
}

#[derive(Debug, Serialize)]
pub struct PlayerResponse {
    pub movie: MovieDetails,
    pub video_link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub movies: Vec<Movie>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Home listing, six movies per page.
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Movie>>, ApiError> {
    let pagination = Pagination::new(params.page.unwrap_or(1), HOME_PER_PAGE);
    let items = state
        .queries()
        .movies_page(pagination.per_page, pagination.page)
        .await?;
    let total = state.queries().total_movies().await?;
    Ok(Json(Page::new(items, pagination, total)))
}

pub async fn list_available(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Movie>>, ApiError> {
    let per_page = params
        .per_page
        .unwrap_or(AVAILABLE_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let pagination = Pagination::new(params.page.unwrap_or(1), per_page);
    let items = state
        .queries()
        .available_page(pagination.per_page, pagination.page)
        .await?;
    let total = state.queries().total_available().await?;
    Ok(Json(Page::new(items, pagination, total)))
}

/// Remote search. An empty query returns random available picks instead;
/// live-search requests get the first five hits only.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        let recommendations = state
            .movies()
            .get_random_recommendations(EMPTY_SEARCH_PICKS)
            .await?;
        return Ok(Json(SearchResponse {
            query,
            results: Vec::new(),
            recommendations,
        }));
    }

    let realtime = params.realtime.unwrap_or(false) || is_xhr(&headers);
    let results = if realtime {
        state.movies().search_movies_realtime(&query).await
    } else {
        state.movies().search_movies(&query).await
    };

    Ok(Json(SearchResponse {
        query,
        results,
        recommendations: Vec::new(),
    }))
}

fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

pub async fn movie_details(
    State(state): State<Arc<AppState>>,
    Path(imdb_id): Path<String>,
) -> Result<Json<MovieDetailsResponse>, ApiError> {
    let movie = load_details(&state, &imdb_id).await?;
    let reviews = state.reviews().get_movie_reviews(&imdb_id).await?;
    let rating = state.reviews().get_movie_rating(&imdb_id).await?;
    Ok(Json(MovieDetailsResponse {
        movie,
        reviews,
        rating,
    }))
}

pub async fn player(
    State(state): State<Arc<AppState>>,
    Path(imdb_id): Path<String>,
) -> Result<Json<PlayerResponse>, ApiError> {
    let movie = load_details(&state, &imdb_id).await?;
    Ok(Json(PlayerResponse {
        video_link: movie.video_link.clone(),
        movie,
    }))
}

async fn load_details(state: &AppState, imdb_id: &str) -> Result<MovieDetails, ApiError> {
    state
        .movies()
        .get_movie_details(imdb_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Movie not found".to_string()))
}

pub async fn recommendation_options(
    State(state): State<Arc<AppState>>,
    CurrentUser(_): CurrentUser,
) -> Result<Json<RecommendationOptions>, ApiError> {
    Ok(Json(RecommendationOptions {
        genres: state.movies().get_all_genres().await?,
        actors: state.movies().get_top_actors(TOP_ACTORS).await?,
        directors: state.movies().get_top_directors(TOP_DIRECTORS).await?,
    }))
}

pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(filter): Json<RecommendationFilter>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let movies = state
        .movies()
        .get_recommendations(user.user_id, &filter)
        .await?;
    Ok(Json(RecommendationsResponse { movies }))
}
