//! HTTP server for the CineVibes catalog.

pub mod api;
pub mod metrics;
pub mod state;
