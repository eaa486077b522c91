//! Registration, verification and session tests against the in-process router.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestFixture};

fn registration(email: &str) -> serde_json::Value {
    json!({
        "nickname": "ana",
        "email": email,
        "password": fixtures::TEST_PASSWORD,
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", "ok");
}

#[tokio::test]
async fn test_register_sends_verification_code() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/register", registration("ana@example.com"))
        .await;
    assert_status!(response, StatusCode::CREATED);
    assert_json_path!(response.body, "email", "ana@example.com");

    let code = fixture.verification_code("ana@example.com").await;
    assert_eq!(code.len(), 6);
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let fixture = TestFixture::new().await;

    let first = fixture
        .post("/api/v1/register", registration("ana@example.com"))
        .await;
    assert_status!(first, StatusCode::CREATED);

    let second = fixture
        .post("/api/v1/register", registration("ana@example.com"))
        .await;
    assert_status!(second, StatusCode::CONFLICT);
    assert!(second.body["error"]
        .as_str()
        .unwrap()
        .contains("already registered"));

    let users = fixture.state.accounts().count_users(None).await.unwrap();
    assert_eq!(users, 1);
}

#[tokio::test]
async fn test_register_requires_all_fields() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post(
            "/api/v1/register",
            json!({ "nickname": "", "email": "ana@example.com", "password": "x" }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failure_order() {
    let fixture = TestFixture::new().await;
    fixture
        .post("/api/v1/register", registration("ana@example.com"))
        .await;

    let unknown = fixture
        .post(
            "/api/v1/login",
            json!({ "email": "nobody@example.com", "password": fixtures::TEST_PASSWORD }),
        )
        .await;
    assert_status!(unknown, StatusCode::UNAUTHORIZED);
    assert_json_path!(unknown.body, "error", "Email not registered");

    // Wrong password is reported before the missing verification
    let wrong = fixture
        .post(
            "/api/v1/login",
            json!({ "email": "ana@example.com", "password": "wrong" }),
        )
        .await;
    assert_status!(wrong, StatusCode::UNAUTHORIZED);
    assert_json_path!(wrong.body, "error", "Incorrect password");

    let unverified = fixture
        .post(
            "/api/v1/login",
            json!({ "email": "ana@example.com", "password": fixtures::TEST_PASSWORD }),
        )
        .await;
    assert_status!(unverified, StatusCode::FORBIDDEN);
    assert!(unverified.set_cookie.is_none());
    assert!(fixture.cookie().is_none());
}

#[tokio::test]
async fn test_verify_then_login() {
    let fixture = TestFixture::new().await;
    fixture
        .post("/api/v1/register", registration("ana@example.com"))
        .await;

    let bad = fixture
        .post(
            "/api/v1/verify",
            json!({ "email": "ana@example.com", "code": "000000x" }),
        )
        .await;
    assert_status!(bad, StatusCode::BAD_REQUEST);
    assert_json_path!(bad.body, "error", "Invalid verification code");

    let code = fixture.verification_code("ana@example.com").await;
    let ok = fixture
        .post(
            "/api/v1/verify",
            json!({ "email": "ana@example.com", "code": code }),
        )
        .await;
    assert_status!(ok, StatusCode::OK);

    let login = fixture
        .login("ana@example.com", fixtures::TEST_PASSWORD)
        .await;
    assert_json_path!(login.body["user"], "email", "ana@example.com");
    assert_json_path!(login.body["user"], "is_admin", false);

    let cookie = login.set_cookie.expect("session cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(fixture.cookie().is_some());
}

#[tokio::test]
async fn test_resend_issues_new_code() {
    let fixture = TestFixture::new().await;
    fixture
        .post("/api/v1/register", registration("ana@example.com"))
        .await;

    let response = fixture
        .post(
            "/api/v1/resend-verification",
            json!({ "email": "ana@example.com" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(fixture.mailer.sent().await.len(), 2);

    // The latest code is the one that verifies
    let code = fixture.verification_code("ana@example.com").await;
    let verify = fixture
        .post(
            "/api/v1/verify",
            json!({ "email": "ana@example.com", "code": code }),
        )
        .await;
    assert_status!(verify, StatusCode::OK);

    let again = fixture
        .post(
            "/api/v1/resend-verification",
            json!({ "email": "ana@example.com" }),
        )
        .await;
    assert_status!(again, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registration_survives_mail_failure() {
    let fixture = TestFixture::new().await;
    fixture.mailer.fail_for("ana@example.com").await;

    let response = fixture
        .post("/api/v1/register", registration("ana@example.com"))
        .await;
    assert_status!(response, StatusCode::CREATED);
    assert!(fixture.mailer.last_to("ana@example.com").await.is_none());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let fixture = TestFixture::new().await;
    fixture.register_and_login("ana@example.com").await;
    let session = fixture.cookie();

    let profile = fixture.get("/api/v1/profile").await;
    assert_status!(profile, StatusCode::OK);

    let logout = fixture.post("/api/v1/logout", json!({})).await;
    assert_status!(logout, StatusCode::OK);
    assert!(fixture.cookie().is_none());

    // The old cookie no longer authenticates
    fixture.use_cookie(session);
    let profile = fixture.get("/api/v1/profile").await;
    assert_status!(profile, StatusCode::UNAUTHORIZED);
    assert_json_path!(profile.body, "error", "Please log in to continue");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_raw("/api/v1/login", "{not json").await;
    assert!(response.status.is_client_error());
}
