//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Query cache (hits, misses)
//! - External services (OMDb, SMTP, object storage)
//! - Accounts (registrations, verifications)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache lookups by cache namespace and result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cinevibes_cache_lookups_total", "Total cache lookups"),
        &["cache", "result"], // result: "hit", "miss"
    )
    .unwrap()
});

/// Cache invalidations by hook.
pub static CACHE_INVALIDATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cinevibes_cache_invalidations_total",
            "Total cache invalidations",
        ),
        &["hook"], // "user", "profiles", "catalog"
    )
    .unwrap()
});

// =============================================================================
// Account Metrics
// =============================================================================

/// Accounts registered.
pub static REGISTRATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cinevibes_registrations_total",
        "Total accounts registered since startup",
    )
    .unwrap()
});

/// Verification attempts by result.
pub static VERIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cinevibes_verifications_total",
            "Total email verification attempts",
        ),
        &["result"], // "verified", "rejected"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cinevibes_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cinevibes_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Emails sent by kind and status.
pub static EMAILS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cinevibes_emails_sent_total", "Total outbound emails"),
        &["kind", "status"], // kind: "verification", "movie_request", "request_confirmation"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record the outcome of an external call.
pub fn observe_external(service: &str, operation: &str, seconds: f64, success: bool) {
    EXTERNAL_SERVICE_DURATION
        .with_label_values(&[service, operation])
        .observe(seconds);
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&[service, operation, if success { "success" } else { "error" }])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(CACHE_INVALIDATIONS.clone()),
        // Accounts
        Box::new(REGISTRATIONS_TOTAL.clone()),
        Box::new(VERIFICATIONS_TOTAL.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
        Box::new(EMAILS_SENT.clone()),
    ]
}
