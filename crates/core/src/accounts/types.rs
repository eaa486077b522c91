use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::{DbError, Row};

/// Input for a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user_id: i64,
    pub email: String,
    #[serde(skip)]
    pub verification_code: String,
}

/// A user as loaded for login.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAccount {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub is_verified: bool,
    pub profile_pic: Option<String>,
}

impl UserAccount {
    pub(crate) fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.get("id")?,
            nickname: row.get("nickname")?,
            email: row.get("email")?,
            is_verified: row.get::<Option<bool>>("is_verified")?.unwrap_or(false),
            profile_pic: row.get("profile_pic")?,
        })
    }
}

/// Public profile of a user. `created_at` is `dd/mm/YYYY`, or empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub profile_pic: Option<String>,
    pub is_verified: bool,
    pub created_at: String,
}

impl UserProfile {
    pub(crate) fn from_row(row: &Row) -> Result<Self, DbError> {
        let created_at: Option<String> = row.get("created_at")?;
        Ok(Self {
            id: row.get("id")?,
            nickname: row.get("nickname")?,
            email: row.get("email")?,
            profile_pic: row.get("profile_pic")?,
            is_verified: row.get::<Option<bool>>("is_verified")?.unwrap_or(false),
            created_at: created_at.as_deref().map(format_created_at).unwrap_or_default(),
        })
    }
}

/// Row in the admin user listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub is_verified: bool,
    pub created_at: Option<String>,
}

impl UserSummary {
    pub(crate) fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.get("id")?,
            nickname: row.get("nickname")?,
            email: row.get("email")?,
            is_verified: row.get::<Option<bool>>("is_verified")?.unwrap_or(false),
            created_at: row.get("created_at")?,
        })
    }
}

/// Admin edit of a user.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminUserUpdate {
    pub nickname: String,
    pub email: String,
    #[serde(default)]
    pub is_verified: bool,
}

/// Format a stored timestamp as `dd/mm/YYYY`. Unparseable values give "".
pub fn format_created_at(raw: &str) -> String {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
        .map(|dt| dt.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_created_at() {
        assert_eq!(format_created_at("2024-03-09 18:22:01"), "09/03/2024");
        assert_eq!(format_created_at("2024-03-09 18:22:01.123456"), "09/03/2024");
        assert_eq!(format_created_at("yesterday"), "");
    }
}
