//! Own profile, avatar upload and public user pages.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use cinevibes_core::accounts::{AccountError, UserProfile};
use cinevibes_core::reviews::UserReview;
use cinevibes_core::storage::{avatar_filename, validate_avatar, UploadError};

use super::error::ApiError;
use super::middleware::CurrentUser;
use crate::state::AppState;

/// Multipart field carrying the avatar.
const AVATAR_FIELD: &str = "profile_pic";

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserProfile,
    pub review_count: u64,
    pub reviews: Vec<UserReview>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateBody {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub success: bool,
    pub user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub profile_pic: String,
}

/// What other users see; the email stays private.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: i64,
    pub nickname: String,
    pub profile_pic: Option<String>,
    pub created_at: String,
    pub review_count: u64,
    pub reviews: Vec<UserReview>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state
        .queries()
        .user_profile(user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let review_count = state.reviews().get_user_review_count(user.user_id).await?;
    let reviews = state
        .reviews()
        .get_user_reviews_with_movies(user.user_id)
        .await?;
    Ok(Json(ProfileResponse {
        user: profile,
        review_count,
        reviews,
    }))
}

/// Update nickname and email, and the password when both entries match.
///
/// A mismatched confirmation keeps the old password and adds a warning.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ProfileUpdateBody>,
) -> Result<Json<ProfileUpdateResponse>, ApiError> {
    let nickname = body.nickname.trim();
    let email = body.email.trim();
    if nickname.is_empty() || email.is_empty() {
        return Err(ApiError::BadRequest(
            "Nickname and email are required".to_string(),
        ));
    }

    let password = body.password.as_deref().filter(|p| !p.is_empty());
    let (new_password, warning) = match password {
        Some(p) if body.confirm_password.as_deref() == Some(p) => (Some(p), None),
        Some(_) => (
            None,
            Some("Password not changed: the confirmation does not match".to_string()),
        ),
        None => (None, None),
    };

    let updated = state
        .accounts()
        .update_user_profile(user.user_id, nickname, email, new_password)
        .await?;
    if !updated {
        return Err(AccountError::DuplicateEmail(email.to_string()).into());
    }

    state.queries().invalidate_user(user.user_id).await;
    state.queries().invalidate_profiles().await;
    state
        .sessions()
        .refresh(&state.identity_for(user.user_id, email, nickname))
        .await;

    let profile = state.queries().user_profile(user.user_id).await?;
    Ok(Json(ProfileUpdateResponse {
        success: true,
        user: profile,
        warning,
    }))
}

/// Replace the avatar. The old one is removed when the active storage owns it.
pub async fn upload_picture(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<AvatarResponse>, ApiError> {
    let max_bytes = state.config().uploads.max_bytes;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;
        upload = Some((filename, content_type, bytes));
        break;
    }

    let Some((filename, content_type, bytes)) = upload else {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    };
    if filename.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }

    let ext = validate_avatar(&filename, content_type.as_deref(), bytes.len(), max_bytes)?;
    let name = avatar_filename(user.user_id, &ext);
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    let reference = state
        .avatars()
        .store(&name, bytes.to_vec(), &content_type)
        .await?;

    let previous = state
        .accounts()
        .get_user_profile(user.user_id)
        .await?
        .and_then(|p| p.profile_pic);
    state
        .accounts()
        .update_profile_pic(user.user_id, &reference)
        .await?;
    state.queries().invalidate_user(user.user_id).await;

    if let Some(old) = previous.filter(|old| *old != reference) {
        if state.avatars().owns(&old) && !state.avatars().remove(&old).await {
            warn!(user_id = user.user_id, reference = %old, "Old avatar not removed");
        }
    }

    info!(
        user_id = user.user_id,
        storage = state.avatars().name(),
        "Profile picture updated"
    );
    Ok(Json(AvatarResponse {
        profile_pic: reference,
    }))
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { max_bytes }.into()
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

pub async fn public_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<PublicProfile>, ApiError> {
    let profile = state
        .queries()
        .user_profile(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let review_count = state.reviews().get_user_review_count(user_id).await?;
    let reviews = state.reviews().get_user_reviews_with_movies(user_id).await?;
    Ok(Json(PublicProfile {
        id: profile.id,
        nickname: profile.nickname,
        profile_pic: profile.profile_pic,
        created_at: profile.created_at,
        review_count,
        reviews,
    }))
}
