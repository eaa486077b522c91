//! Registration, email verification and login.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use cinevibes_core::accounts::{AccountError, RegisterRequest};
use cinevibes_core::{Identity, SESSION_COOKIE};

use super::error::ApiError;
use crate::metrics::{LOGIN_FAILURES_TOTAL, SESSIONS_CREATED_TOTAL};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendBody {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub is_admin: bool,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an account and mail its verification code.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let registration = state.accounts().register(body).await?;
    state
        .send_verification(&registration.email, &registration.verification_code)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: registration.user_id,
            email: registration.email,
            message: "Registration successful. Check your email for the verification code."
                .to_string(),
        }),
    ))
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    if state
        .accounts()
        .verify_code(&body.email, body.code.trim())
        .await?
    {
        Ok(Json(MessageResponse {
            message: "Email verified. You can now log in.".to_string(),
        }))
    } else {
        Err(ApiError::BadRequest("Invalid verification code".to_string()))
    }
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResendBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = body.email.trim();
    match state.accounts().reissue_verification_code(email).await? {
        Some(code) => {
            state.send_verification(email, &code).await;
            Ok(Json(MessageResponse {
                message: "A new verification code has been sent".to_string(),
            }))
        }
        None => Err(ApiError::NotFound(
            "Email not found or already verified".to_string(),
        )),
    }
}

/// Check credentials and start a cookie session.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let account = match state.accounts().login(&body.email, &body.password).await {
        Ok(account) => account,
        Err(e) => {
            let reason = match &e {
                AccountError::UnknownEmail => Some("unknown_email"),
                AccountError::WrongPassword => Some("wrong_password"),
                AccountError::NotVerified => Some("not_verified"),
                _ => None,
            };
            if let Some(reason) = reason {
                LOGIN_FAILURES_TOTAL.with_label_values(&[reason]).inc();
            }
            return Err(e.into());
        }
    };

    let identity = state.identity_for(account.id, &account.email, &account.nickname);
    let is_admin = identity.is_admin;
    let token = state.sessions().create(identity).await;
    SESSIONS_CREATED_TOTAL.inc();
    state.queries().invalidate_user(account.id).await;
    info!(user_id = account.id, is_admin, "User logged in");

    let cookie = Cookie::build((SESSION_COOKIE, state.signer().sign(&token)))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user: SessionUser {
                id: account.id,
                nickname: account.nickname,
                email: account.email,
                is_admin,
                profile_pic: account.profile_pic,
            },
        }),
    ))
}

/// End the session named by the cookie, if any, and clear the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let revoked: Option<Identity> = match jar
        .get(SESSION_COOKIE)
        .and_then(|c| state.signer().verify(c.value()))
    {
        Some(token) => state.sessions().revoke(token).await,
        None => None,
    };
    if let Some(identity) = revoked {
        state.queries().invalidate_user(identity.user_id).await;
        info!(user_id = identity.user_id, "User logged out");
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}
