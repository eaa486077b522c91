//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the external collaborators (metadata API, SMTP,
//! object storage) so controllers and the HTTP layer can be exercised
//! against a scratch SQLite file.
//!
//! # Example
//!
//! ```rust,ignore
//! use cinevibes_core::testing::{fixtures, MockMetadataProvider};
//!
//! let provider = MockMetadataProvider::new();
//! provider.add_movie(fixtures::sample_metadata("tt0113277", "Heat")).await;
//! ```

mod mock_mailer;
mod mock_metadata;
mod mock_storage;

pub use mock_mailer::MockMailer;
pub use mock_metadata::{MockMetadataProvider, RecordedMetadataQuery};
pub use mock_storage::MockAvatarStorage;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::accounts::{AuthController, RegisterRequest};
    use crate::db::Database;
    use crate::db_params;
    use crate::metadata::MovieMetadata;
    use crate::schema;

    /// Password used by [`verified_user`].
    pub const TEST_PASSWORD: &str = "secret123";

    /// Lowest bcrypt cost the hasher accepts.
    pub const TEST_HASH_COST: u32 = 4;

    /// A bootstrapped SQLite database inside `dir`.
    pub async fn test_database(dir: impl AsRef<Path>) -> Database {
        let db = Database::sqlite(dir.as_ref().join("cinevibes-test.db"));
        schema::bootstrap(&db)
            .await
            .expect("schema bootstrap failed");
        db
    }

    /// Metadata for a movie with reasonable defaults.
    pub fn sample_metadata(imdb_id: &str, title: &str) -> MovieMetadata {
        MovieMetadata {
            imdb_id: imdb_id.to_string(),
            title: title.to_string(),
            year: Some("1995".to_string()),
            rated: Some("R".to_string()),
            released: Some("15 Dec 1995".to_string()),
            runtime: Some("170 min".to_string()),
            genre: Some("Crime, Drama".to_string()),
            director: Some("Michael Mann".to_string()),
            writer: Some("Michael Mann".to_string()),
            actors: Some("Al Pacino, Robert De Niro".to_string()),
            plot: Some("A group of professional bank robbers...".to_string()),
            language: Some("English".to_string()),
            country: Some("United States".to_string()),
            awards: None,
            poster: Some(format!("https://img.example/{}.jpg", imdb_id)),
            imdb_rating: Some(8.3),
            kind: Some("movie".to_string()),
        }
    }

    /// Insert a bare catalog row.
    pub async fn insert_movie(
        db: &Database,
        imdb_id: &str,
        title: &str,
        available: bool,
        video_link: Option<&str>,
    ) {
        let mut conn = db.connect_write().await.expect("connect failed");
        conn.execute(
            "INSERT INTO movies (imdb_id, title, available, video_link) VALUES (?, ?, ?, ?)",
            db_params![imdb_id, title, available, video_link],
        )
        .await
        .expect("insert movie failed");
        conn.finish().await.expect("commit failed");
    }

    /// Insert a verified user directly. The nickname is the email's local part.
    pub async fn insert_user(db: &Database, email: &str) -> i64 {
        let nickname = email.split('@').next().unwrap_or(email);
        let mut conn = db.connect_write().await.expect("connect failed");
        let row = conn
            .query_one(
                "INSERT INTO users (nickname, email, password, is_verified) \
                 VALUES (?, ?, ?, ?) RETURNING id",
                db_params![nickname, email, "not-a-hash", true],
            )
            .await
            .expect("insert user failed")
            .expect("no id returned");
        conn.finish().await.expect("commit failed");
        row.get("id").expect("id column")
    }

    /// Register and verify an account with [`TEST_PASSWORD`].
    pub async fn verified_user(auth: &AuthController, email: &str) -> i64 {
        let registration = auth
            .register(RegisterRequest {
                nickname: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("register failed");
        assert!(auth
            .verify_code(email, &registration.verification_code)
            .await
            .expect("verify failed"));
        registration.user_id
    }
}
