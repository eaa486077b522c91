use tracing::debug;

use super::{Cache, CacheKey};
use crate::accounts::{AccountError, AuthController, UserProfile};
use crate::metrics::CACHE_INVALIDATIONS;
use crate::movies::{Movie, MovieController, MovieError, AVAILABLE_IDS_NAMESPACE};
use crate::pagination::Pagination;

const TOTAL_MOVIES: &str = "total_movies";
const MOVIES_PAGE: &str = "movies_page";
const TOTAL_AVAILABLE: &str = "total_available";
const AVAILABLE_PAGE: &str = "available_page";
const USER_PROFILE: &str = "user_profile";

/// Memoized reads for the hot pages, with the matching invalidation hooks.
#[derive(Clone)]
pub struct CachedQueries {
    cache: Cache,
    movies: MovieController,
    accounts: AuthController,
}

impl CachedQueries {
    pub fn new(cache: Cache, movies: MovieController, accounts: AuthController) -> Self {
        Self {
            cache,
            movies,
            accounts,
        }
    }

    pub async fn total_movies(&self) -> Result<u64, MovieError> {
        self.cache
            .get_or_load(&CacheKey::new(TOTAL_MOVIES), || self.movies.count_movies())
            .await
    }

    pub async fn movies_page(&self, per_page: u32, page: u32) -> Result<Vec<Movie>, MovieError> {
        let pagination = Pagination::new(page, per_page);
        let key = CacheKey::new(MOVIES_PAGE)
            .arg(pagination.per_page)
            .arg(pagination.page);
        self.cache
            .get_or_load(&key, || self.movies.movies_page(pagination))
            .await
    }

    pub async fn total_available(&self) -> Result<u64, MovieError> {
        self.cache
            .get_or_load(&CacheKey::new(TOTAL_AVAILABLE), || {
                self.movies.count_available_movies()
            })
            .await
    }

    pub async fn available_page(&self, per_page: u32, page: u32) -> Result<Vec<Movie>, MovieError> {
        let pagination = Pagination::new(page, per_page);
        let key = CacheKey::new(AVAILABLE_PAGE)
            .arg(pagination.per_page)
            .arg(pagination.page);
        self.cache
            .get_or_load(&key, || self.movies.available_movies_page(pagination))
            .await
    }

    pub async fn user_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AccountError> {
        self.cache
            .get_or_load(&CacheKey::new(USER_PROFILE).arg(user_id), || {
                self.accounts.get_user_profile(user_id)
            })
            .await
    }

    /// Evict one user's cached profile.
    pub async fn invalidate_user(&self, user_id: i64) {
        CACHE_INVALIDATIONS.with_label_values(&["user"]).inc();
        debug!(user_id, "Invalidating cached profile");
        self.cache
            .invalidate(&CacheKey::new(USER_PROFILE).arg(user_id))
            .await;
    }

    /// Evict every cached profile.
    pub async fn invalidate_profiles(&self) {
        CACHE_INVALIDATIONS.with_label_values(&["profiles"]).inc();
        self.cache.invalidate_namespace(USER_PROFILE).await;
    }

    /// Evict every catalog-derived entry after a movie write.
    pub async fn invalidate_catalog(&self) {
        CACHE_INVALIDATIONS.with_label_values(&["catalog"]).inc();
        for namespace in [
            TOTAL_MOVIES,
            MOVIES_PAGE,
            TOTAL_AVAILABLE,
            AVAILABLE_PAGE,
            AVAILABLE_IDS_NAMESPACE,
        ] {
            self.cache.invalidate_namespace(namespace).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{insert_movie, insert_user, test_database, TEST_HASH_COST};
    use crate::testing::MockMetadataProvider;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> (CachedQueries, crate::db::Database) {
        let db = test_database(dir).await;
        let cache = Cache::in_memory(Duration::from_secs(60));
        let movies = MovieController::new(db.clone(), Arc::new(MockMetadataProvider::new()))
            .with_cache(cache.clone());
        let accounts = AuthController::new(db.clone(), TEST_HASH_COST);
        (CachedQueries::new(cache, movies, accounts), db)
    }

    #[tokio::test]
    async fn test_catalog_reads_are_cached_until_invalidated() {
        let dir = TempDir::new().unwrap();
        let (queries, db) = setup(&dir).await;
        insert_movie(&db, "tt1", "One", true, None).await;

        assert_eq!(queries.total_movies().await.unwrap(), 1);
        assert_eq!(queries.available_page(6, 1).await.unwrap().len(), 1);

        insert_movie(&db, "tt2", "Two", true, None).await;
        assert_eq!(queries.total_movies().await.unwrap(), 1);
        assert_eq!(queries.available_page(6, 1).await.unwrap().len(), 1);

        queries.invalidate_catalog().await;
        assert_eq!(queries.total_movies().await.unwrap(), 2);
        assert_eq!(queries.total_available().await.unwrap(), 2);
        assert_eq!(queries.available_page(6, 1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pages_are_keyed_by_every_argument() {
        let dir = TempDir::new().unwrap();
        let (queries, db) = setup(&dir).await;
        for i in 0..3 {
            insert_movie(&db, &format!("tt{}", i), "M", false, None).await;
        }
        assert_eq!(queries.movies_page(2, 1).await.unwrap().len(), 2);
        assert_eq!(queries.movies_page(2, 2).await.unwrap().len(), 1);
        assert_eq!(queries.movies_page(6, 1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_user_profile_invalidation() {
        let dir = TempDir::new().unwrap();
        let (queries, db) = setup(&dir).await;
        let id = insert_user(&db, "ana@example.com").await;

        let before = queries.user_profile(id).await.unwrap().unwrap();
        let mut conn = db.connect().await.unwrap();
        conn.execute(
            "UPDATE users SET nickname = 'renamed' WHERE id = ?",
            crate::db_params![id],
        )
        .await
        .unwrap();
        conn.finish().await.unwrap();

        assert_eq!(queries.user_profile(id).await.unwrap().unwrap(), before);
        queries.invalidate_user(id).await;
        assert_eq!(
            queries.user_profile(id).await.unwrap().unwrap().nickname,
            "renamed"
        );

        let mut conn = db.connect().await.unwrap();
        conn.execute(
            "UPDATE users SET nickname = 'again' WHERE id = ?",
            crate::db_params![id],
        )
        .await
        .unwrap();
        conn.finish().await.unwrap();
        queries.invalidate_profiles().await;
        assert_eq!(
            queries.user_profile(id).await.unwrap().unwrap().nickname,
            "again"
        );
    }
}
