//! Short-lived query cache with a pluggable backing store.
//!
//! Keys are built from a namespace plus every argument of the cached call,
//! so different pages or users never share an entry. Values are stored as
//! JSON so any shared store can hold them.

mod memory;
mod queries;

pub use memory::MemoryCacheStore;
pub use queries::CachedQueries;

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::CACHE_LOOKUPS;

/// Errors that can occur when talking to a cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Backing store for cached values.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store an entry that expires after `ttl`.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration)
        -> Result<(), CacheError>;

    /// Remove one entry.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry whose key starts with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError>;
}

/// Cache key made of a namespace and the full argument tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(namespace: &str) -> Self {
        Self(namespace.to_string())
    }

    /// Append one argument.
    pub fn arg(mut self, value: impl Display) -> Self {
        self.0.push(':');
        self.0.push_str(&value.to_string());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Memoizing front for a [`CacheStore`].
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Cache backed by a process-local [`MemoryCacheStore`].
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, or run `load` and cache its result.
    ///
    /// Store failures are logged and fall through to `load`. Loader errors
    /// are returned and never cached.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &CacheKey, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_load_for(key, self.ttl, load).await
    }

    /// Same as [`get_or_load`](Self::get_or_load) with an explicit TTL.
    pub async fn get_or_load_for<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.store.get(key.as_str()).await {
            Ok(Some(cached)) => match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    CACHE_LOOKUPS
                        .with_label_values(&[key.namespace(), "hit"])
                        .inc();
                    debug!(key = %key, "cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache lookup failed"),
        }

        CACHE_LOOKUPS
            .with_label_values(&[key.namespace(), "miss"])
            .inc();

        let value = load().await?;
        match serde_json::to_value(&value) {
            Ok(json) => {
                if let Err(e) = self.store.set(key.as_str(), json, ttl).await {
                    warn!(key = %key, error = %e, "Cache store failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Value not cacheable"),
        }
        Ok(value)
    }

    /// Evict one entry.
    pub async fn invalidate(&self, key: &CacheKey) {
        if let Err(e) = self.store.delete(key.as_str()).await {
            warn!(key = %key, error = %e, "Cache eviction failed");
        }
    }

    /// Evict every entry in a namespace.
    pub async fn invalidate_namespace(&self, namespace: &str) {
        let prefix = format!("{}:", namespace);
        if let Err(e) = self.store.delete_prefix(&prefix).await {
            warn!(namespace, error = %e, "Cache eviction failed");
        }
        // Keys without arguments are the bare namespace.
        if let Err(e) = self.store.delete(namespace).await {
            warn!(namespace, error = %e, "Cache eviction failed");
        }
    }
}
