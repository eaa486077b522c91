//! Mock metadata provider for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::metadata::{MetadataError, MetadataProvider, MovieMetadata, MovieSummary};

/// A recorded provider call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedMetadataQuery {
    Search { query: String },
    GetById { imdb_id: String },
    GetByTitle { title: String, year: Option<String> },
}

/// In-memory [`MetadataProvider`].
///
/// Search matches titles case-insensitively. Every call is recorded, and
/// `set_failing(true)` makes every call fail as an upstream error would.
#[derive(Debug, Default)]
pub struct MockMetadataProvider {
    movies: Arc<RwLock<BTreeMap<String, MovieMetadata>>>,
    queries: Arc<RwLock<Vec<RecordedMetadataQuery>>>,
    failing: Arc<RwLock<bool>>,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_movie(&self, movie: MovieMetadata) {
        self.movies
            .write()
            .await
            .insert(movie.imdb_id.clone(), movie);
    }

    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    pub async fn recorded_queries(&self) -> Vec<RecordedMetadataQuery> {
        self.queries.read().await.clone()
    }

    async fn record(&self, query: RecordedMetadataQuery) -> Result<(), MetadataError> {
        self.queries.write().await.push(query);
        if *self.failing.read().await {
            return Err(MetadataError::ApiError {
                status: 503,
                message: "mock provider failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn search(&self, query: &str) -> Result<Vec<MovieSummary>, MetadataError> {
        self.record(RecordedMetadataQuery::Search {
            query: query.to_string(),
        })
        .await?;
        let needle = query.trim().to_lowercase();
        Ok(self
            .movies
            .read()
            .await
            .values()
            .filter(|m| m.title.to_lowercase().contains(&needle))
            .map(|m| MovieSummary {
                imdb_id: m.imdb_id.clone(),
                title: m.title.clone(),
                year: m.year.clone(),
                kind: m.kind.clone().unwrap_or_else(|| "movie".to_string()),
                poster: m.poster.clone(),
            })
            .collect())
    }

    async fn get_by_id(&self, imdb_id: &str) -> Result<MovieMetadata, MetadataError> {
        self.record(RecordedMetadataQuery::GetById {
            imdb_id: imdb_id.to_string(),
        })
        .await?;
        self.movies
            .read()
            .await
            .get(imdb_id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(format!("Incorrect IMDb ID: {}", imdb_id)))
    }

    async fn get_by_title(
        &self,
        title: &str,
        year: Option<&str>,
    ) -> Result<MovieMetadata, MetadataError> {
        self.record(RecordedMetadataQuery::GetByTitle {
            title: title.to_string(),
            year: year.map(str::to_string),
        })
        .await?;
        self.movies
            .read()
            .await
            .values()
            .find(|m| {
                m.title.eq_ignore_ascii_case(title.trim())
                    && year.map_or(true, |y| m.year.as_deref() == Some(y))
            })
            .cloned()
            .ok_or_else(|| MetadataError::NotFound("Movie not found!".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::sample_metadata;

    #[tokio::test]
    async fn test_lookup_and_recording() {
        let provider = MockMetadataProvider::new();
        provider.add_movie(sample_metadata("tt0113277", "Heat")).await;

        assert_eq!(provider.search("HEA").await.unwrap().len(), 1);
        assert!(provider.get_by_title("heat", Some("1995")).await.is_ok());
        assert!(matches!(
            provider.get_by_title("heat", Some("2001")).await,
            Err(MetadataError::NotFound(_))
        ));
        assert_eq!(provider.recorded_queries().await.len(), 3);

        provider.set_failing(true).await;
        assert!(provider.get_by_id("tt0113277").await.is_err());
    }
}
