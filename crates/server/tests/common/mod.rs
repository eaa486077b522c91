//! Common test utilities for in-process HTTP testing with mocks.
//!
//! The fixture builds the full router over a scratch SQLite database, with
//! the metadata provider, mailer and avatar storage replaced by mocks. It
//! keeps the session cookie between requests like a browser would.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use cinevibes_core::config::{AuthConfig, MailConfig, UploadsConfig};
use cinevibes_core::testing::{MockAvatarStorage, MockMailer, MockMetadataProvider};
use cinevibes_core::{Config, SESSION_COOKIE};
use cinevibes_server::state::AppState;

/// Re-export fixtures for test convenience
pub use cinevibes_core::testing::fixtures;

pub const ADMIN_EMAIL: &str = "admin@cinevibes.test";
pub const REQUESTS_RECIPIENT: &str = "requests@cinevibes.test";

const MULTIPART_BOUNDARY: &str = "cinevibes-test-boundary";

/// Test fixture with mock collaborators.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_profile() {
///     let fixture = TestFixture::new().await;
///     fixture.register_and_login("ana@example.com").await;
///
///     let response = fixture.get("/api/v1/profile").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub state: Arc<AppState>,
    /// Mock metadata provider - seed the movies it knows
    pub metadata: Arc<MockMetadataProvider>,
    /// Mock mailer - inspect sent mail, make addresses fail
    pub mailer: Arc<MockMailer>,
    /// Mock avatar storage
    pub avatars: Arc<MockAvatarStorage>,
    /// Temporary directory for the database and uploads
    pub temp_dir: TempDir,
    cookie: Mutex<Option<String>>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookie: Option<String>,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = Config {
            auth: AuthConfig {
                secret_key: "test-secret-key".to_string(),
                admin_email: ADMIN_EMAIL.to_string(),
                password_hash_cost: fixtures::TEST_HASH_COST,
                ..Default::default()
            },
            uploads: UploadsConfig {
                dir: temp_dir.path().join("uploads"),
                ..Default::default()
            },
            mail: Some(MailConfig {
                sender: "noreply@cinevibes.test".to_string(),
                password: "unused".to_string(),
                smtp_host: "localhost".to_string(),
                smtp_port: 2525,
                timeout_secs: 1,
                requests_recipient: REQUESTS_RECIPIENT.to_string(),
            }),
            ..Default::default()
        };

        let db = fixtures::test_database(temp_dir.path()).await;
        let metadata = Arc::new(MockMetadataProvider::new());
        let mailer = Arc::new(MockMailer::new());
        let avatars = Arc::new(MockAvatarStorage::new());

        let state = Arc::new(
            AppState::new(
                config,
                db,
                Arc::clone(&metadata) as Arc<dyn cinevibes_core::MetadataProvider>,
                Some(Arc::clone(&mailer) as Arc<dyn cinevibes_core::Mailer>),
                Arc::clone(&avatars) as Arc<dyn cinevibes_core::AvatarStorage>,
            )
            .expect("Failed to create app state"),
        );
        let router = cinevibes_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            metadata,
            mailer,
            avatars,
            temp_dir,
            cookie: Mutex::new(None),
        }
    }

    /// Current session cookie value, if logged in.
    pub fn cookie(&self) -> Option<String> {
        self.cookie.lock().unwrap().clone()
    }

    /// Switch to another saved session (or none).
    pub fn use_cookie(&self, cookie: Option<String>) {
        *self.cookie.lock().unwrap() = cookie;
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// GET with one extra header.
    pub async fn get_with_header(&self, path: &str, name: &str, value: &str) -> TestResponse {
        let builder = Request::builder()
            .method("GET")
            .uri(path)
            .header(name, value);
        self.send(builder, Body::empty()).await
    }

    /// POST with a raw body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len());
        self.send(builder, Body::from(body.to_string())).await
    }

    /// POST a single-file multipart form.
    pub async fn post_multipart(
        &self,
        path: &str,
        field: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> TestResponse {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n",
            b = MULTIPART_BOUNDARY,
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

        let builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            )
            .header(header::CONTENT_LENGTH, body.len());
        self.send(builder, Body::from(body)).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(json_body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json_body).unwrap())
            }
            None => Body::empty(),
        };
        self.send(builder, body).await
    }

    async fn send(&self, mut builder: axum::http::request::Builder, body: Body) -> TestResponse {
        if let Some(cookie) = self.cookie() {
            builder = builder.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, cookie));
        }
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let set_cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", SESSION_COOKIE)))
            .map(str::to_string);
        if let Some(raw) = &set_cookie {
            let value = raw
                .split(';')
                .next()
                .and_then(|pair| pair.split_once('='))
                .map(|(_, v)| v.to_string())
                .unwrap_or_default();
            self.use_cookie(Some(value).filter(|v| !v.is_empty()));
        }

        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into()))
        };

        TestResponse {
            status,
            body,
            set_cookie,
        }
    }

    /// Verification code from the last mail sent to `email`.
    pub async fn verification_code(&self, email: &str) -> String {
        let mail = self
            .mailer
            .last_to(email)
            .await
            .expect("No verification email sent");
        let start = mail
            .html_body
            .find("font-weight: bold;\">")
            .expect("No code in verification email")
            + "font-weight: bold;\">".len();
        let rest = &mail.html_body[start..];
        rest[..rest.find('<').expect("Unterminated code")].to_string()
    }

    /// Register, verify and log in through the API. Returns the user id.
    pub async fn register_and_login(&self, email: &str) -> i64 {
        let nickname = email.split('@').next().unwrap_or(email);
        let response = self
            .post(
                "/api/v1/register",
                json!({ "nickname": nickname, "email": email, "password": fixtures::TEST_PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        let user_id = response.body["user_id"].as_i64().expect("user_id");

        let code = self.verification_code(email).await;
        let response = self
            .post("/api/v1/verify", json!({ "email": email, "code": code }))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        self.login(email, fixtures::TEST_PASSWORD).await;
        user_id
    }

    /// Create the admin account directly and log in as it.
    pub async fn login_as_admin(&self) -> i64 {
        let user_id = fixtures::verified_user(self.state.accounts(), ADMIN_EMAIL).await;
        self.login(ADMIN_EMAIL, fixtures::TEST_PASSWORD).await;
        user_id
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        let response = self
            .post(
                "/api/v1/login",
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response
    }

    /// Seed a movie the provider knows and add it to the catalog.
    pub async fn seed_movie(&self, imdb_id: &str, title: &str, available: bool) {
        self.metadata
            .add_movie(fixtures::sample_metadata(imdb_id, title))
            .await;
        self.state
            .movies()
            .add_movie_from_provider(imdb_id, available, None)
            .await
            .expect("Failed to seed movie");
        self.state.queries().invalidate_catalog().await;
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
