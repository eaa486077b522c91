//! Avatar upload validation and storage backends.

mod local;
mod supabase;

pub use local::{LocalAvatarStorage, LOCAL_PREFIX};
pub use supabase::SupabaseStorage;

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A rejected upload. The message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Format not allowed. Only JPG/PNG images.")]
    UnsupportedFormat,

    #[error("The file is not a valid image.")]
    NotAnImage,

    #[error("File too large. Maximum size is {}MB.", .max_bytes / (1024 * 1024))]
    TooLarge { max_bytes: usize },
}

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid object name: {0}")]
    InvalidName(String),
}

/// Check an uploaded avatar and return its normalized extension.
pub fn validate_avatar(
    filename: &str,
    content_type: Option<&str>,
    size: usize,
    max_bytes: usize,
) -> Result<String, UploadError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(UploadError::UnsupportedFormat);
    }
    if !content_type.is_some_and(|ct| ct.starts_with("image/")) {
        return Err(UploadError::NotAnImage);
    }
    if size > max_bytes {
        return Err(UploadError::TooLarge { max_bytes });
    }
    Ok(ext)
}

/// Unique object name for a user's avatar: `user_{id}_{unix}_{8 hex}.{ext}`.
pub fn avatar_filename(user_id: i64, ext: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("user_{}_{}_{}.{}", user_id, now, &suffix[..8], ext)
}

/// Where avatars are written.
#[async_trait]
pub trait AvatarStorage: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Store the bytes and return the reference saved on the user row.
    async fn store(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Best-effort delete. Returns whether something was removed.
    async fn remove(&self, reference: &str) -> bool;

    /// Whether `reference` was produced by this backend.
    fn owns(&self, reference: &str) -> bool;
}

fn check_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 2 * 1024 * 1024;

    #[test]
    fn test_validate_accepts_images() {
        assert_eq!(
            validate_avatar("me.PNG", Some("image/png"), 1024, MAX).unwrap(),
            "png"
        );
        assert_eq!(
            validate_avatar("me.jpeg", Some("image/jpeg"), MAX, MAX).unwrap(),
            "jpeg"
        );
    }

    #[test]
    fn test_validate_rejects_extension() {
        assert_eq!(
            validate_avatar("me.gif", Some("image/gif"), 10, MAX),
            Err(UploadError::UnsupportedFormat)
        );
        assert_eq!(
            validate_avatar("noext", Some("image/png"), 10, MAX),
            Err(UploadError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_validate_rejects_content_type() {
        assert_eq!(
            validate_avatar("me.png", Some("text/plain"), 10, MAX),
            Err(UploadError::NotAnImage)
        );
        assert_eq!(
            validate_avatar("me.png", None, 10, MAX),
            Err(UploadError::NotAnImage)
        );
    }

    #[test]
    fn test_validate_rejects_size() {
        let err = validate_avatar("me.png", Some("image/png"), MAX + 1, MAX).unwrap_err();
        assert_eq!(err.to_string(), "File too large. Maximum size is 2MB.");
    }

    #[test]
    fn test_avatar_filename_shape() {
        let name = avatar_filename(7, "png");
        let parts: Vec<&str> = name.trim_end_matches(".png").split('_').collect();
        assert_eq!(parts[0], "user");
        assert_eq!(parts[1], "7");
        assert!(parts[2].parse::<u64>().is_ok());
        assert_eq!(parts[3].len(), 8);
        assert!(name.ends_with(".png"));
        check_name(&name).unwrap();
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("../etc/passwd").is_err());
        assert!(check_name(".hidden").is_err());
        assert!(check_name("").is_err());
    }
}
