//! Schema bootstrap and additive column migrations.
//!
//! Only the SQLite backend is bootstrapped. A PostgreSQL deployment is
//! expected to be provisioned from [`POSTGRES_SCHEMA`] beforehand.

use tracing::{debug, info};

use crate::db::{Backend, Connection, Database, DbError};
use crate::db_params;

const SQLITE_TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nickname TEXT NOT NULL,
        email TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,
        is_verified INTEGER DEFAULT 0,
        verification_code TEXT,
        profile_pic TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS movies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        imdb_id TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL,
        year TEXT,
        poster TEXT,
        plot TEXT,
        director TEXT,
        actors TEXT,
        genres TEXT,
        imdb_rating REAL,
        release_date TEXT,
        runtime TEXT,
        language TEXT,
        country TEXT,
        awards TEXT,
        available INTEGER DEFAULT 0,
        video_link TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        movie_id TEXT NOT NULL,
        review_text TEXT NOT NULL,
        rating INTEGER NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (movie_id) REFERENCES movies(imdb_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS favorites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        movie_id TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(user_id, movie_id),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (movie_id) REFERENCES movies(imdb_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS verification_codes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        code TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        expires_at TIMESTAMP,
        is_used INTEGER DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_preferences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER UNIQUE NOT NULL,
        favorite_genres TEXT,
        favorite_actors TEXT,
        favorite_directors TEXT,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (user_id) REFERENCES users(id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS watch_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        movie_id TEXT NOT NULL,
        watched_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (movie_id) REFERENCES movies(imdb_id)
    )"#,
];

/// Created after optional columns exist, since some index them.
const SQLITE_INDEXES_AND_VIEWS: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_movies_title ON movies(title)",
    "CREATE INDEX IF NOT EXISTS idx_movies_imdb_id ON movies(imdb_id)",
    "CREATE INDEX IF NOT EXISTS idx_movies_available ON movies(available)",
    "CREATE INDEX IF NOT EXISTS idx_reviews_movie_id ON reviews(movie_id)",
    "CREATE INDEX IF NOT EXISTS idx_reviews_user_id ON reviews(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_favorites_user_id ON favorites(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_favorites_movie_id ON favorites(movie_id)",
    r#"CREATE VIEW IF NOT EXISTS movie_ratings AS
        SELECT m.imdb_id AS movie_id,
               m.title AS title,
               COUNT(r.id) AS review_count,
               AVG(r.rating) AS average_rating
        FROM movies m
        LEFT JOIN reviews r ON r.movie_id = m.imdb_id
        GROUP BY m.imdb_id, m.title"#,
    r#"CREATE VIEW IF NOT EXISTS user_activity AS
        SELECT u.id AS user_id,
               u.nickname AS nickname,
               (SELECT COUNT(*) FROM reviews r WHERE r.user_id = u.id) AS review_count,
               (SELECT COUNT(*) FROM favorites f WHERE f.user_id = u.id) AS favorite_count,
               (SELECT COUNT(*) FROM watch_history w WHERE w.user_id = u.id) AS watched_count
        FROM users u"#,
];

/// Optional columns added to existing tables when missing.
const OPTIONAL_COLUMNS: &[(&str, &str, &str)] = &[
    ("movies", "runtime", "TEXT"),
    ("movies", "language", "TEXT"),
    ("movies", "country", "TEXT"),
    ("movies", "awards", "TEXT"),
    ("movies", "available", "INTEGER DEFAULT 0"),
    ("movies", "video_link", "TEXT"),
    ("users", "verification_code", "TEXT"),
    ("users", "profile_pic", "TEXT"),
];

/// Equivalent DDL for a pre-provisioned PostgreSQL database.
pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    nickname TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    is_verified BOOLEAN DEFAULT FALSE,
    verification_code TEXT,
    profile_pic TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS movies (
    id SERIAL PRIMARY KEY,
    imdb_id TEXT UNIQUE NOT NULL,
    title TEXT NOT NULL,
    year TEXT,
    poster TEXT,
    plot TEXT,
    director TEXT,
    actors TEXT,
    genres TEXT,
    imdb_rating DOUBLE PRECISION,
    release_date TEXT,
    runtime TEXT,
    language TEXT,
    country TEXT,
    awards TEXT,
    available BOOLEAN DEFAULT FALSE,
    video_link TEXT
);
CREATE TABLE IF NOT EXISTS reviews (
    id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    movie_id TEXT NOT NULL REFERENCES movies(imdb_id),
    review_text TEXT NOT NULL,
    rating INTEGER NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS favorites (
    id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    movie_id TEXT NOT NULL REFERENCES movies(imdb_id),
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(user_id, movie_id)
);
CREATE TABLE IF NOT EXISTS verification_codes (
    id SERIAL PRIMARY KEY,
    email TEXT NOT NULL,
    code TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMP,
    is_used BOOLEAN DEFAULT FALSE
);
CREATE TABLE IF NOT EXISTS user_preferences (
    id SERIAL PRIMARY KEY,
    user_id INTEGER UNIQUE NOT NULL REFERENCES users(id),
    favorite_genres TEXT,
    favorite_actors TEXT,
    favorite_directors TEXT,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS watch_history (
    id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    movie_id TEXT NOT NULL REFERENCES movies(imdb_id),
    watched_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE OR REPLACE VIEW movie_ratings AS
    SELECT m.imdb_id AS movie_id, m.title AS title,
           COUNT(r.id) AS review_count,
           AVG(r.rating)::DOUBLE PRECISION AS average_rating
    FROM movies m LEFT JOIN reviews r ON r.movie_id = m.imdb_id
    GROUP BY m.imdb_id, m.title;
CREATE OR REPLACE VIEW user_activity AS
    SELECT u.id AS user_id, u.nickname AS nickname,
           (SELECT COUNT(*) FROM reviews r WHERE r.user_id = u.id) AS review_count,
           (SELECT COUNT(*) FROM favorites f WHERE f.user_id = u.id) AS favorite_count,
           (SELECT COUNT(*) FROM watch_history w WHERE w.user_id = u.id) AS watched_count
    FROM users u;
"#;

/// Create tables, indexes and views, then add missing optional columns.
///
/// A no-op on PostgreSQL.
pub async fn bootstrap(db: &Database) -> Result<(), DbError> {
    if db.backend() != Backend::Sqlite {
        info!("Skipping schema bootstrap for {} backend", db.backend().as_str());
        return Ok(());
    }

    let mut conn = db.connect_write().await?;
    for statement in SQLITE_TABLES {
        conn.execute(statement, db_params![]).await?;
    }
    let added = ensure_columns(&mut conn).await?;
    for statement in SQLITE_INDEXES_AND_VIEWS {
        conn.execute(statement, db_params![]).await?;
    }
    conn.finish().await?;

    info!(added_columns = added, "Database schema ready");
    Ok(())
}

/// Add every optional column missing from its table. Returns how many were added.
async fn ensure_columns(conn: &mut Connection) -> Result<usize, DbError> {
    let mut added = 0;
    for (table, column, definition) in OPTIONAL_COLUMNS {
        let existing = table_columns(conn, table).await?;
        if existing.iter().any(|c| c == column) {
            continue;
        }
        debug!(table, column, "Adding missing column");
        conn.execute(
            &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition),
            db_params![],
        )
        .await?;
        added += 1;
    }
    Ok(added)
}

async fn table_columns(conn: &mut Connection, table: &str) -> Result<Vec<String>, DbError> {
    conn.query_all(&format!("PRAGMA table_info({})", table), db_params![])
        .await?
        .iter()
        .map(|row| row.get::<String>("name"))
        .collect()
}
