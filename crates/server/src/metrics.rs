//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the CineVibes server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Session and login failures
//!
//! Core metrics (cache, external services, email) are registered here too.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cinevibes_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cinevibes_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "cinevibes_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Session Metrics
// =============================================================================

/// Session cookies that did not resolve to a live session.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cinevibes_auth_failures_total",
            "Total rejected session cookies",
        ),
        &["reason"], // "invalid_credentials", "session_expired", "internal_error"
    )
    .unwrap()
});

/// Failed logins by reason.
pub static LOGIN_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cinevibes_login_failures_total", "Total failed logins"),
        &["reason"], // "unknown_email", "wrong_password", "not_verified"
    )
    .unwrap()
});

/// Sessions started since startup.
pub static SESSIONS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cinevibes_sessions_created_total",
        "Total sessions created since startup",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Sessions
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(LOGIN_FAILURES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(SESSIONS_CREATED_TOTAL.clone()))
        .unwrap();

    // Core metrics (cache, accounts, external services)
    for metric in cinevibes_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

static IMDB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/tt\d+(/|$)").unwrap());
static NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    if path.starts_with("/uploads/") {
        return "/uploads/{file}".to_string();
    }
    let result = IMDB_ID.replace_all(path, "/{imdb_id}$1");
    // The separator is consumed by each match, so run twice for `/1/2`.
    let result = NUMERIC_ID.replace_all(&result, "/{id}$1");
    let result = NUMERIC_ID.replace_all(&result, "/{id}$1");
    result.to_string()
}
