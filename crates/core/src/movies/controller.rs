use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    LocalOverride, Movie, MovieCard, MovieDetails, MovieError, MovieUpdate, NewMovie,
    RecommendationFilter, SearchHit,
};
use crate::cache::{Cache, CacheKey};
use crate::db::{Database, Value};
use crate::db_params;
use crate::metadata::{split_list, MetadataError, MetadataProvider};
use crate::pagination::Pagination;

pub const PLACEHOLDER_POSTER: &str = "https://via.placeholder.com/300x450?text=No+Poster";

/// Cache namespace of the available-id set used by search.
pub const AVAILABLE_IDS_NAMESPACE: &str = "available_ids";

const MOVIE_COLUMNS: &str = "id, imdb_id, title, year, poster, plot, director, actors, genres, \
     imdb_rating, release_date, runtime, language, country, awards, available, video_link";

const RECOMMENDATION_LIMIT: u32 = 6;

/// Catalog operations over the local table and a metadata provider.
#[derive(Clone)]
pub struct MovieController {
    db: Database,
    provider: Arc<dyn MetadataProvider>,
    cache: Option<Cache>,
}

impl MovieController {
    pub fn new(db: Database, provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            db,
            provider,
            cache: None,
        }
    }

    /// Memoize the available-id set in `cache`.
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.provider
    }

    /// Remote details merged with the local availability override.
    ///
    /// Provider failures degrade to `None`.
    pub async fn get_movie_details(&self, imdb_id: &str) -> Result<Option<MovieDetails>, MovieError> {
        let local = self.local_override(imdb_id).await?;
        match self.provider.get_by_id(imdb_id).await {
            Ok(meta) => Ok(Some(MovieDetails::merge(imdb_id, meta, local.as_ref()))),
            Err(MetadataError::NotFound(_)) => {
                debug!(imdb_id, "Movie unknown to metadata provider");
                Ok(None)
            }
            Err(e) => {
                warn!(imdb_id, error = %e, "Metadata lookup failed");
                Ok(None)
            }
        }
    }

    /// Remote search restricted to movies, flagged against the local catalog.
    pub async fn search_movies(&self, query: &str) -> Vec<SearchHit> {
        let hits = match self.provider.search(query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(query, error = %e, "Movie search failed");
                return Vec::new();
            }
        };
        let available = match self.available_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not load available movie ids");
                HashSet::new()
            }
        };

        hits.into_iter()
            .filter(|hit| hit.is_movie())
            .map(|hit| SearchHit {
                is_available: available.contains(&hit.imdb_id),
                imdb_id: hit.imdb_id,
                title: hit.title,
                year: hit.year,
                poster: hit.poster,
            })
            .collect()
    }

    /// The first five results of [`search_movies`](Self::search_movies).
    pub async fn search_movies_realtime(&self, query: &str) -> Vec<SearchHit> {
        let mut hits = self.search_movies(query).await;
        hits.truncate(5);
        hits
    }

    /// Ids of every movie flagged available.
    pub async fn available_ids(&self) -> Result<HashSet<String>, MovieError> {
        match &self.cache {
            Some(cache) => {
                cache
                    .get_or_load(&CacheKey::new(AVAILABLE_IDS_NAMESPACE), || {
                        self.load_available_ids()
                    })
                    .await
            }
            None => self.load_available_ids().await,
        }
    }

    async fn load_available_ids(&self) -> Result<HashSet<String>, MovieError> {
        let mut conn = self.db.connect().await?;
        let rows = conn
            .query_all(
                "SELECT imdb_id FROM movies WHERE available = ?",
                db_params![true],
            )
            .await?;
        conn.close().await?;
        Ok(rows
            .iter()
            .map(|r| r.get::<String>("imdb_id"))
            .collect::<Result<_, _>>()?)
    }

    /// Random available movies for the browse page.
    pub async fn get_random_recommendations(&self, count: u32) -> Result<Vec<MovieCard>, MovieError> {
        let mut conn = self.db.connect().await?;
        let rows = conn
            .query_all(
                "SELECT imdb_id, title, year, poster FROM movies \
                 WHERE available = ? ORDER BY RANDOM() LIMIT ?",
                db_params![true, count],
            )
            .await?;
        conn.close().await?;

        rows.iter()
            .map(|row| -> Result<MovieCard, MovieError> {
                let poster: Option<String> = row.get("poster")?;
                Ok(MovieCard {
                    imdb_id: row.get("imdb_id")?,
                    title: row.get("title")?,
                    year: row.get("year")?,
                    poster: poster
                        .filter(|p| !p.trim().is_empty())
                        .unwrap_or_else(|| PLACEHOLDER_POSTER.to_string()),
                })
            })
            .collect()
    }

    /// Every distinct genre in the catalog, sorted.
    pub async fn get_all_genres(&self) -> Result<Vec<String>, MovieError> {
        let lists = self.text_column("genres").await?;
        let mut genres: Vec<String> = lists
            .iter()
            .flat_map(|g| split_list(Some(g)))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        genres.sort();
        Ok(genres)
    }

    /// Distinct actor names in alphabetical order, truncated to `limit`.
    pub async fn get_top_actors(&self, limit: usize) -> Result<Vec<String>, MovieError> {
        let lists = self.text_column("actors").await?;
        Ok(sorted_distinct(
            lists.iter().flat_map(|a| split_list(Some(a))),
            limit,
        ))
    }

    /// Distinct directors in alphabetical order, truncated to `limit`.
    pub async fn get_top_directors(&self, limit: usize) -> Result<Vec<String>, MovieError> {
        let lists = self.text_column("director").await?;
        Ok(sorted_distinct(
            lists.into_iter().map(|d| d.trim().to_string()),
            limit,
        ))
    }

    async fn text_column(&self, column: &str) -> Result<Vec<String>, MovieError> {
        let mut conn = self.db.connect().await?;
        let rows = conn
            .query_all(
                &format!(
                    "SELECT {col} FROM movies WHERE {col} IS NOT NULL AND {col} != ''",
                    col = column
                ),
                db_params![],
            )
            .await?;
        conn.close().await?;
        Ok(rows
            .iter()
            .map(|r| r.get::<String>(column))
            .collect::<Result<_, _>>()?)
    }

    /// Up to six available movies the user has not favorited, best rated first.
    pub async fn get_recommendations(
        &self,
        user_id: i64,
        filter: &RecommendationFilter,
    ) -> Result<Vec<Movie>, MovieError> {
        let mut sql = format!(
            "SELECT {} FROM movies m WHERE m.available = ? AND NOT EXISTS \
             (SELECT 1 FROM favorites f WHERE f.movie_id = m.imdb_id AND f.user_id = ?)",
            MOVIE_COLUMNS
        );
        let mut params: Vec<Value> = vec![true.into(), user_id.into()];

        for (column, term) in [
            ("genres", &filter.genre),
            ("actors", &filter.actor),
            ("director", &filter.director),
        ] {
            if let Some(term) = term.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                sql.push_str(&format!(" AND LOWER(m.{}) LIKE LOWER(?)", column));
                params.push(format!("%{}%", term).into());
            }
        }
        sql.push_str(" ORDER BY (m.imdb_rating IS NULL), m.imdb_rating DESC LIMIT ?");
        params.push(RECOMMENDATION_LIMIT.into());

        self.query_movies(&sql, &params).await
    }

    // =========================================================================
    // Listings
    // =========================================================================

    pub async fn count_movies(&self) -> Result<u64, MovieError> {
        self.count("SELECT COUNT(*) AS total FROM movies", db_params![])
            .await
    }

    /// Newest releases first.
    pub async fn movies_page(&self, pagination: Pagination) -> Result<Vec<Movie>, MovieError> {
        self.query_movies(
            &format!(
                "SELECT {} FROM movies ORDER BY (release_date IS NULL), release_date DESC, id DESC \
                 LIMIT ? OFFSET ?",
                MOVIE_COLUMNS
            ),
            db_params![pagination.limit(), pagination.offset()],
        )
        .await
    }

    pub async fn count_available_movies(&self) -> Result<u64, MovieError> {
        self.count(
            "SELECT COUNT(*) AS total FROM movies WHERE available = ?",
            db_params![true],
        )
        .await
    }

    pub async fn available_movies_page(&self, pagination: Pagination) -> Result<Vec<Movie>, MovieError> {
        self.query_movies(
            &format!(
                "SELECT {} FROM movies WHERE available = ? ORDER BY title ASC LIMIT ? OFFSET ?",
                MOVIE_COLUMNS
            ),
            db_params![true, pagination.limit(), pagination.offset()],
        )
        .await
    }

    /// The local row for `imdb_id`.
    pub async fn get_movie(&self, imdb_id: &str) -> Result<Option<Movie>, MovieError> {
        let mut movies = self
            .query_movies(
                &format!("SELECT {} FROM movies WHERE imdb_id = ?", MOVIE_COLUMNS),
                db_params![imdb_id],
            )
            .await?;
        Ok(movies.pop())
    }

    async fn local_override(&self, imdb_id: &str) -> Result<Option<LocalOverride>, MovieError> {
        let mut conn = self.db.connect().await?;
        let row = conn
            .query_one(
                "SELECT video_link, available FROM movies WHERE imdb_id = ?",
                db_params![imdb_id],
            )
            .await?;
        conn.close().await?;
        match row {
            Some(row) => Ok(Some(LocalOverride {
                available: row.get::<Option<bool>>("available")?.unwrap_or(false),
                video_link: row.get("video_link")?,
            })),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Fetch `imdb_id` from the provider and upsert it.
    pub async fn add_movie_from_provider(
        &self,
        imdb_id: &str,
        available: bool,
        video_link: Option<String>,
    ) -> Result<Movie, MovieError> {
        let imdb_id = imdb_id.trim();
        if imdb_id.is_empty() {
            return Err(MovieError::Validation("imdb_id is required".to_string()));
        }
        let meta = match self.provider.get_by_id(imdb_id).await {
            Ok(meta) => meta,
            Err(MetadataError::NotFound(_)) => return Err(MovieError::NotFound(imdb_id.to_string())),
            Err(e) => return Err(e.into()),
        };

        let mut movie = NewMovie::from_metadata(&meta, available, video_link);
        if movie.imdb_id.is_empty() {
            movie.imdb_id = imdb_id.to_string();
        }
        self.upsert_movie(&movie).await?;
        self.get_movie(&movie.imdb_id)
            .await?
            .ok_or_else(|| MovieError::NotFound(movie.imdb_id.clone()))
    }

    /// Insert or replace the row keyed by `imdb_id`.
    pub async fn upsert_movie(&self, movie: &NewMovie) -> Result<(), MovieError> {
        if movie.title.trim().is_empty() {
            return Err(MovieError::Validation("title is required".to_string()));
        }
        let mut conn = self.db.connect_write().await?;
        conn.execute(
            "INSERT INTO movies (imdb_id, title, year, poster, plot, director, actors, genres, \
             imdb_rating, release_date, runtime, language, country, awards, available, video_link) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (imdb_id) DO UPDATE SET \
             title = excluded.title, year = excluded.year, poster = excluded.poster, \
             plot = excluded.plot, director = excluded.director, actors = excluded.actors, \
             genres = excluded.genres, imdb_rating = excluded.imdb_rating, \
             release_date = excluded.release_date, runtime = excluded.runtime, \
             language = excluded.language, country = excluded.country, awards = excluded.awards, \
             available = excluded.available, video_link = excluded.video_link",
            db_params![
                &movie.imdb_id,
                &movie.title,
                movie.year.as_deref(),
                movie.poster.as_deref(),
                movie.plot.as_deref(),
                movie.director.as_deref(),
                movie.actors.as_deref(),
                movie.genres.as_deref(),
                movie.imdb_rating,
                movie.release_date.as_deref(),
                movie.runtime.as_deref(),
                movie.language.as_deref(),
                movie.country.as_deref(),
                movie.awards.as_deref(),
                movie.available,
                movie.video_link.as_deref(),
            ],
        )
        .await?;
        conn.finish().await?;
        info!(imdb_id = %movie.imdb_id, "Upserted movie");
        Ok(())
    }

    pub async fn update_movie(&self, imdb_id: &str, update: &MovieUpdate) -> Result<bool, MovieError> {
        let title = update
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let video_link = update
            .video_link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());

        let mut conn = self.db.connect_write().await?;
        let cursor = conn
            .execute(
                "UPDATE movies SET title = COALESCE(?, title), available = ?, video_link = ? \
                 WHERE imdb_id = ?",
                db_params![title, update.available, video_link, imdb_id],
            )
            .await?;
        conn.finish().await?;
        Ok(cursor.rows_affected() > 0)
    }

    /// Delete a movie and everything that references it.
    pub async fn delete_movie(&self, imdb_id: &str) -> Result<bool, MovieError> {
        let mut conn = self.db.connect_write().await?;
        for table in ["reviews", "favorites", "watch_history"] {
            conn.execute(
                &format!("DELETE FROM {} WHERE movie_id = ?", table),
                db_params![imdb_id],
            )
            .await?;
        }
        let cursor = conn
            .execute("DELETE FROM movies WHERE imdb_id = ?", db_params![imdb_id])
            .await?;
        conn.finish().await?;

        let deleted = cursor.rows_affected() > 0;
        if deleted {
            info!(imdb_id, "Deleted movie");
        }
        Ok(deleted)
    }

    /// Catalog listing for the dashboard, filtered on title or imdb id.
    pub async fn search_catalog(
        &self,
        search: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<Movie>, MovieError> {
        let (filter, mut params) = catalog_filter(search);
        params.push(pagination.limit().into());
        params.push(pagination.offset().into());
        self.query_movies(
            &format!(
                "SELECT {} FROM movies{} ORDER BY id DESC LIMIT ? OFFSET ?",
                MOVIE_COLUMNS, filter
            ),
            &params,
        )
        .await
    }

    pub async fn count_catalog(&self, search: Option<&str>) -> Result<u64, MovieError> {
        let (filter, params) = catalog_filter(search);
        self.count(&format!("SELECT COUNT(*) AS total FROM movies{}", filter), &params)
            .await
    }

    async fn query_movies(&self, sql: &str, params: &[Value]) -> Result<Vec<Movie>, MovieError> {
        let mut conn = self.db.connect().await?;
        let rows = conn.query_all(sql, params).await?;
        conn.close().await?;
        Ok(rows
            .iter()
            .map(Movie::from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn count(&self, sql: &str, params: &[Value]) -> Result<u64, MovieError> {
        let mut conn = self.db.connect().await?;
        let row = conn.query_one(sql, params).await?;
        conn.close().await?;
        Ok(row
            .map(|r| r.get::<u64>("total"))
            .transpose()?
            .unwrap_or(0))
    }
}

fn catalog_filter(search: Option<&str>) -> (&'static str, Vec<Value>) {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let pattern = format!("%{}%", term);
            (
                " WHERE LOWER(title) LIKE LOWER(?) OR LOWER(imdb_id) LIKE LOWER(?)",
                vec![pattern.clone().into(), pattern.into()],
            )
        }
        None => ("", Vec::new()),
    }
}

fn sorted_distinct(names: impl Iterator<Item = String>, limit: usize) -> Vec<String> {
    names
        .filter(|n| !n.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(limit)
        .collect()
}
