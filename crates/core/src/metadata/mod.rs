//! Movie metadata from the OMDb API.
//!
//! Lookups are used to enrich catalog entries, search results and movie
//! requests. Callers treat every error as "no data" and keep serving.

mod omdb;
mod types;

pub use omdb::{OmdbClient, DEFAULT_OMDB_URL};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to the metadata provider.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// No movie matches the lookup.
    #[error("Movie not found: {0}")]
    NotFound(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Client not configured (missing or rejected API key).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

/// Source of movie metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search titles by free text.
    async fn search(&self, query: &str) -> Result<Vec<MovieSummary>, MetadataError>;

    /// Full details for one IMDb identifier.
    async fn get_by_id(&self, imdb_id: &str) -> Result<MovieMetadata, MetadataError>;

    /// Full details for the best match of a title, optionally narrowed by year.
    async fn get_by_title(
        &self,
        title: &str,
        year: Option<&str>,
    ) -> Result<MovieMetadata, MetadataError>;
}

/// Provider used when no API key is configured. Every lookup fails with
/// [`MetadataError::NotConfigured`], so callers fall back to local data.
#[derive(Debug, Default)]
pub struct UnconfiguredProvider;

#[async_trait]
impl MetadataProvider for UnconfiguredProvider {
    async fn search(&self, _query: &str) -> Result<Vec<MovieSummary>, MetadataError> {
        Err(not_configured())
    }

    async fn get_by_id(&self, _imdb_id: &str) -> Result<MovieMetadata, MetadataError> {
        Err(not_configured())
    }

    async fn get_by_title(
        &self,
        _title: &str,
        _year: Option<&str>,
    ) -> Result<MovieMetadata, MetadataError> {
        Err(not_configured())
    }
}

fn not_configured() -> MetadataError {
    MetadataError::NotConfigured("OMDb API key is not set".to_string())
}
