//! OMDb (Open Movie Database) API client.
//!
//! OMDb answers every lookup with HTTP 200 and signals failures through a
//! `"Response": "False"` body. Results are cached in-process: searches for
//! 30 seconds, detail lookups for 60.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{MetadataError, MetadataProvider, MovieMetadata, MovieSummary};
use crate::cache::{Cache, CacheKey};
use crate::config::MetadataConfig;
use crate::metrics::observe_external;

pub const DEFAULT_OMDB_URL: &str = "http://www.omdbapi.com/";

/// OMDb API client.
pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    cache: Cache,
    search_ttl: Duration,
    detail_ttl: Duration,
}

impl OmdbClient {
    /// Create a new OMDb client.
    pub fn new(config: &MetadataConfig) -> Result<Self, MetadataError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MetadataError::NotConfigured("OMDb API key is required".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("CineVibes/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OMDB_URL.to_string()),
            api_key,
            cache: Cache::in_memory(Duration::from_secs(config.detail_ttl_secs)),
            search_ttl: Duration::from_secs(config.search_ttl_secs),
            detail_ttl: Duration::from_secs(config.detail_ttl_secs),
        })
    }

    async fn fetch(
        &self,
        operation: &str,
        params: &[(&str, &str)],
    ) -> Result<OmdbResponse, MetadataError> {
        debug!("OMDb {}: {:?}", operation, params);
        let started = Instant::now();
        let result = self.fetch_inner(params).await;
        observe_external(
            "omdb",
            operation,
            started.elapsed().as_secs_f64(),
            result.is_ok(),
        );
        result
    }

    async fn fetch_inner(&self, params: &[(&str, &str)]) -> Result<OmdbResponse, MetadataError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == 401 {
            return Err(MetadataError::NotConfigured(
                "Invalid OMDb API key".to_string(),
            ));
        }
        if status == 429 {
            return Err(MetadataError::RateLimitExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: OmdbResponse = response.json().await.map_err(|e| {
            MetadataError::ParseError(format!("Failed to parse OMDb response: {}", e))
        })?;

        if body.response.eq_ignore_ascii_case("true") {
            Ok(body)
        } else {
            Err(classify_failure(body.error.unwrap_or_default()))
        }
    }
}

#[async_trait]
impl MetadataProvider for OmdbClient {
    async fn search(&self, query: &str) -> Result<Vec<MovieSummary>, MetadataError> {
        let key = CacheKey::new("omdb_search").arg(query.trim().to_lowercase());
        self.cache
            .get_or_load_for(&key, self.search_ttl, || async {
                match self.fetch("search", &[("s", query.trim())]).await {
                    Ok(body) => Ok(body.search.into_iter().map(MovieSummary::from).collect()),
                    Err(MetadataError::NotFound(_)) => Ok(Vec::new()),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    async fn get_by_id(&self, imdb_id: &str) -> Result<MovieMetadata, MetadataError> {
        let key = CacheKey::new("omdb_id").arg(imdb_id);
        self.cache
            .get_or_load_for(&key, self.detail_ttl, || async {
                let body = self
                    .fetch("get_by_id", &[("i", imdb_id), ("plot", "full")])
                    .await?;
                Ok(MovieMetadata::from(body))
            })
            .await
    }

    async fn get_by_title(
        &self,
        title: &str,
        year: Option<&str>,
    ) -> Result<MovieMetadata, MetadataError> {
        let year = year.map(str::trim).filter(|y| !y.is_empty());
        let key = CacheKey::new("omdb_title")
            .arg(title.trim().to_lowercase())
            .arg(year.unwrap_or_default());
        self.cache
            .get_or_load_for(&key, self.detail_ttl, || async {
                let mut params = vec![("t", title.trim())];
                if let Some(y) = year {
                    params.push(("y", y));
                }
                let body = self.fetch("get_by_title", &params).await?;
                Ok(MovieMetadata::from(body))
            })
            .await
    }
}

fn classify_failure(message: String) -> MetadataError {
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("incorrect imdb id") {
        MetadataError::NotFound(message)
    } else if lower.contains("api key") {
        MetadataError::NotConfigured(message)
    } else if lower.contains("limit reached") {
        MetadataError::RateLimitExceeded
    } else {
        MetadataError::ApiError {
            status: 200,
            message,
        }
    }
}

/// OMDb reports missing values as "N/A".
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "N/A")
}

// =============================================================================
// OMDb API response types (internal)
// =============================================================================

#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Search", default)]
    search: Vec<OmdbSearchItem>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Rated")]
    rated: Option<String>,
    #[serde(rename = "Released")]
    released: Option<String>,
    #[serde(rename = "Runtime")]
    runtime: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Director")]
    director: Option<String>,
    #[serde(rename = "Writer")]
    writer: Option<String>,
    #[serde(rename = "Actors")]
    actors: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "Language")]
    language: Option<String>,
    #[serde(rename = "Country")]
    country: Option<String>,
    #[serde(rename = "Awards")]
    awards: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchItem {
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Poster")]
    poster: Option<String>,
}

impl From<OmdbSearchItem> for MovieSummary {
    fn from(item: OmdbSearchItem) -> Self {
        Self {
            imdb_id: item.imdb_id,
            title: item.title,
            year: present(item.year),
            kind: item.kind,
            poster: present(item.poster),
        }
    }
}

impl From<OmdbResponse> for MovieMetadata {
    fn from(r: OmdbResponse) -> Self {
        Self {
            imdb_id: r.imdb_id.unwrap_or_default(),
            title: r.title.unwrap_or_default(),
            year: present(r.year),
            rated: present(r.rated),
            released: present(r.released),
            runtime: present(r.runtime),
            genre: present(r.genre),
            director: present(r.director),
            writer: present(r.writer),
            actors: present(r.actors),
            plot: present(r.plot),
            language: present(r.language),
            country: present(r.country),
            awards: present(r.awards),
            poster: present(r.poster),
            imdb_rating: present(r.imdb_rating).and_then(|v| v.parse().ok()),
            kind: present(r.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let config = MetadataConfig::default();
        assert!(matches!(
            OmdbClient::new(&config),
            Err(MetadataError::NotConfigured(_))
        ));

        let config = MetadataConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(OmdbClient::new(&config).is_err());
    }

    #[test]
    fn test_parse_detail_response() {
        let json = r#"{
            "Title": "The Shawshank Redemption",
            "Year": "1994",
            "Rated": "R",
            "Released": "14 Oct 1994",
            "Runtime": "142 min",
            "Genre": "Drama",
            "Director": "Frank Darabont",
            "Writer": "Stephen King, Frank Darabont",
            "Actors": "Tim Robbins, Morgan Freeman, Bob Gunton",
            "Plot": "Over the course of several years...",
            "Language": "English",
            "Country": "United States",
            "Awards": "N/A",
            "Poster": "https://m.media-amazon.com/images/shawshank.jpg",
            "imdbRating": "9.3",
            "imdbID": "tt0111161",
            "Type": "movie",
            "Response": "True"
        }"#;
        let body: OmdbResponse = serde_json::from_str(json).unwrap();
        let meta = MovieMetadata::from(body);
        assert_eq!(meta.imdb_id, "tt0111161");
        assert_eq!(meta.title, "The Shawshank Redemption");
        assert_eq!(meta.imdb_rating, Some(9.3));
        assert_eq!(meta.awards, None);
        assert_eq!(meta.release_date_iso().as_deref(), Some("1994-10-14"));
    }

    #[test]
    fn test_parse_search_response() {
        let json = r#"{
            "Search": [
                {"Title": "Heat", "Year": "1995", "imdbID": "tt0113277", "Type": "movie", "Poster": "N/A"},
                {"Title": "Heat Wave", "Year": "2009", "imdbID": "tt1", "Type": "series", "Poster": "p.jpg"}
            ],
            "totalResults": "2",
            "Response": "True"
        }"#;
        let body: OmdbResponse = serde_json::from_str(json).unwrap();
        let hits: Vec<MovieSummary> = body.search.into_iter().map(MovieSummary::from).collect();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].is_movie());
        assert_eq!(hits[0].poster, None);
        assert!(!hits[1].is_movie());
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("Movie not found!".to_string()),
            MetadataError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure("Incorrect IMDb ID.".to_string()),
            MetadataError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure("Invalid API key!".to_string()),
            MetadataError::NotConfigured(_)
        ));
        assert!(matches!(
            classify_failure("Request limit reached!".to_string()),
            MetadataError::RateLimitExceeded
        ));
        assert!(matches!(
            classify_failure("Too many results.".to_string()),
            MetadataError::ApiError { .. }
        ));
    }
}
