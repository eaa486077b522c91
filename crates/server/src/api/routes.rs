use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use super::{accounts, admin, handlers, movies, profile, requests, reviews};
use super::middleware::{body_limit_middleware, metrics_middleware, session_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let uploads = &state.config().uploads;
    let max_bytes = uploads.max_bytes;
    let cache_control = HeaderValue::from_str(&format!(
        "public, max-age={}",
        uploads.static_max_age_secs
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("public"));

    // Uploaded avatars under /uploads/profile_pics/
    let uploads_service = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            cache_control,
        ))
        .service(ServeDir::new(&uploads.dir));

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Accounts
        .route("/register", post(accounts::register))
        .route("/verify", post(accounts::verify))
        .route("/resend-verification", post(accounts::resend_verification))
        .route("/login", post(accounts::login))
        .route("/logout", post(accounts::logout))
        // Catalog
        .route("/movies", get(movies::list_movies))
        .route("/movies/available", get(movies::list_available))
        .route("/search", get(movies::search))
        .route("/movies/{imdb_id}", get(movies::movie_details))
        .route("/movies/{imdb_id}/player", get(movies::player))
        .route("/recommendations/options", get(movies::recommendation_options))
        .route("/recommendations", post(movies::recommendations))
        // Reviews
        .route("/movies/{imdb_id}/reviews", post(reviews::add_review))
        .route(
            "/reviews/{id}",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        // Movie requests
        .route("/request-movie", post(requests::request_movie))
        // Profiles
        .route(
            "/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/profile/picture", post(profile::upload_picture))
        .route("/users/{id}", get(profile::public_profile))
        // Admin
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/movies", post(admin::add_movie))
        .route(
            "/admin/movies/{imdb_id}",
            put(admin::update_movie).delete(admin::delete_movie),
        )
        .route(
            "/admin/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .nest_service("/uploads", uploads_service)
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(DefaultBodyLimit::max(max_bytes))
        .layer(middleware::from_fn_with_state(state, body_limit_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
