//! Persistence adapter over SQLite and PostgreSQL.
//!
//! Every [`Database::connect`] opens a fresh physical connection with an open
//! transaction. Queries are written once with `?` placeholders; rows come
//! back as name-keyed [`Row`]s regardless of backend. [`Connection::finish`]
//! commits and releases, dropping a connection rolls back.
//!
//! Scopes that write open with [`Database::connect_write`]. On SQLite that
//! takes the write lock up front, so a busy writer is waited on through the
//! busy timeout instead of failing a read-to-write upgrade.

#[cfg(feature = "postgres")]
mod postgres;
mod sqlite;
mod value;

pub use value::{Cursor, FromValue, Row, Value};

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::DatabaseConfig;

/// Errors raised by the persistence adapter.
#[derive(Debug, Error)]
pub enum DbError {
    /// The configured backend cannot be used.
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// Could not open a connection.
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Any other statement failure.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Column not found in row: {0}")]
    MissingColumn(String),

    #[error("Cannot decode column {column} (found {found})")]
    Decode { column: String, found: String },
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation(_))
    }
}

/// Which engine serves connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
        }
    }
}

/// Backend-specific statement execution.
#[async_trait]
pub(crate) trait Driver: Send {
    async fn run(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, DbError>;
    async fn begin(&mut self) -> Result<(), DbError>;

    /// Begin a transaction that is expected to write.
    async fn begin_write(&mut self) -> Result<(), DbError> {
        self.begin().await
    }

    async fn commit(&mut self) -> Result<(), DbError>;
    async fn rollback(&mut self) -> Result<(), DbError>;
}

#[derive(Debug, Clone)]
enum Target {
    Sqlite(PathBuf),
    Postgres(String),
}

/// Handle used to open connections against the configured backend.
#[derive(Debug, Clone)]
pub struct Database {
    target: Target,
}

impl Database {
    /// A configured URL routes every connection to PostgreSQL, otherwise
    /// the SQLite file at `path` is used.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        match config.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Self::postgres(url),
            _ => Self::sqlite(config.path.clone()),
        }
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::Sqlite(path.into()),
        }
    }

    pub fn postgres(url: impl Into<String>) -> Self {
        Self {
            target: Target::Postgres(url.into()),
        }
    }

    pub fn backend(&self) -> Backend {
        match self.target {
            Target::Sqlite(_) => Backend::Sqlite,
            Target::Postgres(_) => Backend::Postgres,
        }
    }

    /// Open a new physical connection and begin a transaction.
    pub async fn connect(&self) -> Result<Connection, DbError> {
        self.open(false).await
    }

    /// Open a connection whose transaction holds the write lock from the start.
    pub async fn connect_write(&self) -> Result<Connection, DbError> {
        self.open(true).await
    }

    async fn open(&self, write: bool) -> Result<Connection, DbError> {
        let driver: Box<dyn Driver> = match &self.target {
            Target::Sqlite(path) => Box::new(sqlite::SqliteDriver::open(path)?),
            Target::Postgres(url) => open_postgres(url).await?,
        };
        let mut conn = Connection {
            driver,
            backend: self.backend(),
            write,
        };
        conn.begin().await?;
        Ok(conn)
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(url: &str) -> Result<Box<dyn Driver>, DbError> {
    Ok(Box::new(postgres::PostgresDriver::open(url).await?))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_url: &str) -> Result<Box<dyn Driver>, DbError> {
    Err(DbError::Configuration(
        "database.url is set but PostgreSQL support was not compiled in (enable the `postgres` feature)"
            .to_string(),
    ))
}

/// One scoped connection. Uncommitted work is rolled back on drop.
pub struct Connection {
    driver: Box<dyn Driver>,
    backend: Backend,
    write: bool,
}

impl Connection {
    async fn begin(&mut self) -> Result<(), DbError> {
        if self.write {
            self.driver.begin_write().await
        } else {
            self.driver.begin().await
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// An empty cursor, for callers that build results incrementally.
    pub fn cursor(&self) -> Cursor {
        Cursor::default()
    }

    /// Execute one statement written with `?` placeholders.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, DbError> {
        debug!(backend = self.backend.as_str(), sql, params = params.len(), "execute");
        self.driver.run(sql, params).await
    }

    /// Execute and return the first row, if any.
    pub async fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>, DbError> {
        Ok(self.execute(sql, params).await?.fetch_one())
    }

    /// Execute and return every row.
    pub async fn query_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        Ok(self.execute(sql, params).await?.fetch_all())
    }

    /// Commit the open transaction and start a new one.
    pub async fn commit(&mut self) -> Result<(), DbError> {
        self.driver.commit().await?;
        self.begin().await
    }

    /// Commit and release the connection.
    pub async fn finish(mut self) -> Result<(), DbError> {
        self.driver.commit().await
    }

    /// Release the connection, discarding uncommitted work.
    pub async fn close(mut self) -> Result<(), DbError> {
        self.driver.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_params;
    use tempfile::TempDir;

    async fn scratch_db(dir: &TempDir) -> Database {
        let db = Database::sqlite(dir.path().join("scratch.db"));
        let mut conn = db.connect().await.unwrap();
        conn.execute(
            "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT UNIQUE, qty INTEGER)",
            db_params![],
        )
        .await
        .unwrap();
        conn.finish().await.unwrap();
        db
    }

    #[test]
    fn test_from_config_routes_by_url() {
        let mut config = DatabaseConfig::default();
        assert_eq!(Database::from_config(&config).backend(), Backend::Sqlite);

        config.url = Some("   ".to_string());
        assert_eq!(Database::from_config(&config).backend(), Backend::Sqlite);

        config.url = Some("postgres://localhost/cinevibes".to_string());
        assert_eq!(Database::from_config(&config).backend(), Backend::Postgres);
    }

    #[tokio::test]
    async fn test_finish_commits() {
        let dir = TempDir::new().unwrap();
        let db = scratch_db(&dir).await;

        let mut conn = db.connect().await.unwrap();
        let mut cursor = conn
            .execute(
                "INSERT INTO items (name, qty) VALUES (?, ?) RETURNING id",
                db_params!["apple", 3],
            )
            .await
            .unwrap();
        let id: i64 = cursor.fetch_one().unwrap().get("id").unwrap();
        conn.finish().await.unwrap();

        let mut conn = db.connect().await.unwrap();
        let row = conn
            .query_one("SELECT name, qty FROM items WHERE id = ?", db_params![id])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get::<String>("name").unwrap(), "apple");
        assert_eq!(row.get::<i64>("qty").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let dir = TempDir::new().unwrap();
        let db = scratch_db(&dir).await;

        {
            let mut conn = db.connect().await.unwrap();
            conn.execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["pear", 1])
                .await
                .unwrap();
        }

        let mut conn = db.connect().await.unwrap();
        let row = conn
            .query_one("SELECT COUNT(*) AS total FROM items", db_params![])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get::<i64>("total").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_keeps_connection_usable() {
        let dir = TempDir::new().unwrap();
        let db = scratch_db(&dir).await;

        let mut conn = db.connect().await.unwrap();
        conn.execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["fig", 1])
            .await
            .unwrap();
        conn.commit().await.unwrap();
        conn.execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["kiwi", 2])
            .await
            .unwrap();
        conn.close().await.unwrap();

        let mut conn = db.connect().await.unwrap();
        let names: Vec<String> = conn
            .query_all("SELECT name FROM items ORDER BY id", db_params![])
            .await
            .unwrap()
            .iter()
            .map(|r| r.get("name").unwrap())
            .collect();
        assert_eq!(names, vec!["fig".to_string()]);
    }

    #[tokio::test]
    async fn test_unique_violation_is_structured() {
        let dir = TempDir::new().unwrap();
        let db = scratch_db(&dir).await;

        let mut conn = db.connect().await.unwrap();
        conn.execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["plum", 1])
            .await
            .unwrap();
        let err = conn
            .execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["plum", 2])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_rows_affected_for_update() {
        let dir = TempDir::new().unwrap();
        let db = scratch_db(&dir).await;

        let mut conn = db.connect().await.unwrap();
        conn.execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["a", 1])
            .await
            .unwrap();
        conn.execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["b", 1])
            .await
            .unwrap();
        let cursor = conn
            .execute("UPDATE items SET qty = ? WHERE qty = ?", db_params![5, 1])
            .await
            .unwrap();
        assert_eq!(cursor.rows_affected(), 2);

        let cursor = conn
            .execute("DELETE FROM items WHERE name = ?", db_params!["missing"])
            .await
            .unwrap();
        assert_eq!(cursor.rows_affected(), 0);
        assert_eq!(cursor.last_insert_id(), None);
    }

    #[tokio::test]
    async fn test_last_insert_id_on_sqlite() {
        let dir = TempDir::new().unwrap();
        let db = scratch_db(&dir).await;

        let mut conn = db.connect().await.unwrap();
        assert_eq!(conn.cursor().rows_affected(), 0);
        let first = conn
            .execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["a", 1])
            .await
            .unwrap();
        let second = conn
            .execute("INSERT INTO items (name, qty) VALUES (?, ?)", db_params!["b", 1])
            .await
            .unwrap();
        assert!(first.last_insert_id().is_some());
        assert_eq!(second.last_insert_id(), first.last_insert_id().map(|id| id + 1));
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_postgres_without_feature_is_configuration_error() {
        let db = Database::postgres("postgres://localhost/cinevibes");
        assert!(matches!(db.connect().await, Err(DbError::Configuration(_))));
    }
}
