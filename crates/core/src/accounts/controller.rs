use tracing::{debug, info, warn};

use super::{
    AccountError, AdminUserUpdate, RegisterRequest, Registration, UserAccount, UserProfile,
    UserSummary,
};
use crate::db::{Database, DbError, Value};
use crate::db_params;
use crate::metrics::{REGISTRATIONS_TOTAL, VERIFICATIONS_TOTAL};
use crate::pagination::Pagination;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

const USER_COLUMNS: &str = "id, nickname, email, is_verified, profile_pic, created_at";

/// Account operations backed by the `users` table.
#[derive(Clone)]
pub struct AuthController {
    db: Database,
    hash_cost: u32,
}

impl AuthController {
    pub fn new(db: Database, hash_cost: u32) -> Self {
        Self { db, hash_cost }
    }

    /// Create an unverified account and return its verification code.
    pub async fn register(&self, request: RegisterRequest) -> Result<Registration, AccountError> {
        let nickname = request.nickname.trim();
        let email = request.email.trim();
        if nickname.is_empty() || email.is_empty() || request.password.trim().is_empty() {
            return Err(AccountError::Validation(
                "Nickname, email and password are required".to_string(),
            ));
        }

        if self.email_exists(email).await? {
            return Err(AccountError::DuplicateEmail(email.to_string()));
        }

        let hash = self.hash_password(&request.password).await?;
        let code = generate_verification_code();

        let mut conn = self.db.connect_write().await?;
        let row = conn
            .query_one(
                "INSERT INTO users (nickname, email, password, verification_code, is_verified) \
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
                db_params![nickname, email, hash, &code, false],
            )
            .await
            .map_err(|e| duplicate_or(e, email))?;
        let user_id: i64 = match row {
            Some(row) => row.get("id")?,
            None => return Err(DbError::Query("INSERT returned no id".to_string()).into()),
        };
        conn.finish().await?;

        REGISTRATIONS_TOTAL.inc();
        info!(user_id, "Registered new account");
        Ok(Registration {
            user_id,
            email: email.to_string(),
            verification_code: code,
        })
    }

    /// Mark the account verified when `code` matches exactly.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<bool, AccountError> {
        let mut conn = self.db.connect_write().await?;
        let cursor = conn
            .execute(
                "UPDATE users SET is_verified = ? WHERE email = ? AND verification_code = ?",
                db_params![true, email.trim(), code],
            )
            .await?;
        conn.finish().await?;

        let matched = cursor.rows_affected() > 0;
        VERIFICATIONS_TOTAL
            .with_label_values(&[if matched { "verified" } else { "rejected" }])
            .inc();
        Ok(matched)
    }

    /// Check credentials. Fails on unknown email, then password, then verification.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserAccount, AccountError> {
        let mut conn = self.db.connect().await?;
        let row = conn
            .query_one(
                "SELECT id, nickname, email, password, is_verified, profile_pic \
                 FROM users WHERE email = ?",
                db_params![email.trim()],
            )
            .await?;
        conn.close().await?;

        let row = row.ok_or(AccountError::UnknownEmail)?;
        let hash: String = row.get("password")?;
        if !verify_password(password, hash).await? {
            return Err(AccountError::WrongPassword);
        }

        let account = UserAccount::from_row(&row)?;
        if !account.is_verified {
            return Err(AccountError::NotVerified);
        }
        Ok(account)
    }

    pub async fn get_user_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AccountError> {
        let mut conn = self.db.connect().await?;
        let row = conn
            .query_one(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                db_params![user_id],
            )
            .await?;
        conn.close().await?;
        Ok(row.as_ref().map(UserProfile::from_row).transpose()?)
    }

    /// Update nickname and email, plus the password when one is given.
    ///
    /// Returns `false` when the new email belongs to another account.
    pub async fn update_user_profile(
        &self,
        user_id: i64,
        nickname: &str,
        email: &str,
        new_password: Option<&str>,
    ) -> Result<bool, AccountError> {
        let hash = match new_password.filter(|p| !p.is_empty()) {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };

        let mut conn = self.db.connect_write().await?;
        let updated = conn
            .execute(
                "UPDATE users SET nickname = ?, email = ? WHERE id = ?",
                db_params![nickname.trim(), email.trim(), user_id],
            )
            .await;
        match updated {
            Ok(_) => {}
            Err(e) if e.is_unique_violation() => {
                debug!(user_id, "Profile update rejected: email taken");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(hash) = hash {
            conn.execute(
                "UPDATE users SET password = ? WHERE id = ?",
                db_params![hash, user_id],
            )
            .await?;
        }
        conn.finish().await?;
        info!(user_id, "Updated profile");
        Ok(true)
    }

    pub async fn update_profile_pic(&self, user_id: i64, reference: &str) -> Result<(), AccountError> {
        let mut conn = self.db.connect_write().await?;
        conn.execute(
            "UPDATE users SET profile_pic = ? WHERE id = ?",
            db_params![reference, user_id],
        )
        .await?;
        conn.finish().await?;
        Ok(())
    }

    /// Issue and store a fresh code for an unverified account.
    pub async fn reissue_verification_code(&self, email: &str) -> Result<Option<String>, AccountError> {
        let code = generate_verification_code();
        let mut conn = self.db.connect_write().await?;
        let cursor = conn
            .execute(
                "UPDATE users SET verification_code = ? \
                 WHERE email = ? AND (is_verified IS NULL OR NOT is_verified)",
                db_params![&code, email.trim()],
            )
            .await?;
        conn.finish().await?;
        Ok((cursor.rows_affected() > 0).then_some(code))
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, AccountError> {
        let mut conn = self.db.connect().await?;
        let row = conn
            .query_one(
                "SELECT 1 AS found FROM users WHERE email = ?",
                db_params![email.trim()],
            )
            .await?;
        conn.close().await?;
        Ok(row.is_some())
    }

    // =========================================================================
    // Admin
    // =========================================================================

    pub async fn list_users(
        &self,
        search: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<UserSummary>, AccountError> {
        let (filter, mut params) = user_filter(search);
        params.push(pagination.limit().into());
        params.push(pagination.offset().into());

        let mut conn = self.db.connect().await?;
        let rows = conn
            .query_all(
                &format!(
                    "SELECT {} FROM users{} ORDER BY id DESC LIMIT ? OFFSET ?",
                    USER_COLUMNS, filter
                ),
                &params,
            )
            .await?;
        conn.close().await?;
        Ok(rows
            .iter()
            .map(UserSummary::from_row)
            .collect::<Result<_, _>>()?)
    }

    pub async fn count_users(&self, search: Option<&str>) -> Result<u64, AccountError> {
        let (filter, params) = user_filter(search);
        let mut conn = self.db.connect().await?;
        let row = conn
            .query_one(&format!("SELECT COUNT(*) AS total FROM users{}", filter), &params)
            .await?;
        conn.close().await?;
        Ok(row
            .map(|r| r.get::<u64>("total"))
            .transpose()?
            .unwrap_or(0))
    }

    /// Returns `false` when the user is missing or the email is taken.
    pub async fn admin_update_user(
        &self,
        user_id: i64,
        update: &AdminUserUpdate,
    ) -> Result<bool, AccountError> {
        if update.nickname.trim().is_empty() || update.email.trim().is_empty() {
            return Err(AccountError::Validation(
                "Nickname and email are required".to_string(),
            ));
        }

        let mut conn = self.db.connect_write().await?;
        let result = conn
            .execute(
                "UPDATE users SET nickname = ?, email = ?, is_verified = ? WHERE id = ?",
                db_params![
                    update.nickname.trim(),
                    update.email.trim(),
                    update.is_verified,
                    user_id
                ],
            )
            .await;
        let cursor = match result {
            Ok(cursor) => cursor,
            Err(e) if e.is_unique_violation() => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        conn.finish().await?;
        Ok(cursor.rows_affected() > 0)
    }

    /// Delete a user together with their reviews, favorites and history.
    pub async fn delete_user(&self, user_id: i64) -> Result<bool, AccountError> {
        let mut conn = self.db.connect_write().await?;
        for table in ["reviews", "favorites", "watch_history", "user_preferences"] {
            conn.execute(
                &format!("DELETE FROM {} WHERE user_id = ?", table),
                db_params![user_id],
            )
            .await?;
        }
        let cursor = conn
            .execute("DELETE FROM users WHERE id = ?", db_params![user_id])
            .await?;
        conn.finish().await?;

        let deleted = cursor.rows_affected() > 0;
        if deleted {
            info!(user_id, "Deleted user");
        }
        Ok(deleted)
    }

    async fn hash_password(&self, password: &str) -> Result<String, AccountError> {
        let password = password.to_string();
        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AccountError::Hash(e.to_string()))?
            .map_err(|e| AccountError::Hash(e.to_string()))
    }
}

async fn verify_password(password: &str, hash: String) -> Result<bool, AccountError> {
    let password = password.to_string();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AccountError::Hash(e.to_string()))?;
    match verified {
        Ok(ok) => Ok(ok),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            Ok(false)
        }
    }
}

fn duplicate_or(err: DbError, email: &str) -> AccountError {
    if err.is_unique_violation() {
        AccountError::DuplicateEmail(email.to_string())
    } else {
        err.into()
    }
}

fn user_filter(search: Option<&str>) -> (&'static str, Vec<Value>) {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let pattern = format!("%{}%", term);
            (
                " WHERE LOWER(nickname) LIKE LOWER(?) OR LOWER(email) LIKE LOWER(?)",
                vec![pattern.clone().into(), pattern.into()],
            )
        }
        None => ("", Vec::new()),
    }
}

/// Six characters drawn uniformly from `[A-Z0-9]`.
pub(crate) fn generate_verification_code() -> String {
    let mut code = String::with_capacity(CODE_LEN);
    while code.len() < CODE_LEN {
        let random = uuid::Uuid::new_v4();
        // Bytes 6 and 8 carry the fixed version and variant bits
        let bytes = random
            .as_bytes()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 6 && *i != 8)
            .map(|(_, b)| *b);
        for c in bytes.filter_map(code_char) {
            if code.len() == CODE_LEN {
                break;
            }
            code.push(c);
        }
    }
    code
}

/// Map a random byte onto the alphabet, rejecting the biased tail.
fn code_char(byte: u8) -> Option<char> {
    let size = CODE_ALPHABET.len();
    let index = usize::from(byte);
    (index < 256 / size * size).then(|| CODE_ALPHABET[index % size] as char)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{test_database, verified_user, TEST_HASH_COST};
    use tempfile::TempDir;

    async fn controller(dir: &TempDir) -> AuthController {
        AuthController::new(test_database(dir).await, TEST_HASH_COST)
    }

    fn request(email: &str) -> RegisterRequest {
        RegisterRequest {
            nickname: "Ana".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
        }
    }

    #[test]
    fn test_verification_code_shape() {
        for _ in 0..50 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_code_char_rejects_biased_tail() {
        let mut counts = [0usize; 36];
        for byte in 0..=u8::MAX {
            if let Some(c) = code_char(byte) {
                let index = CODE_ALPHABET.iter().position(|a| *a as char == c).unwrap();
                counts[index] += 1;
            }
        }
        assert!(counts.iter().all(|n| *n == 7));
        assert!(code_char(251).is_some());
        assert!((252..=255).all(|b| code_char(b).is_none()));
    }

    #[tokio::test]
    async fn test_register_then_verify_then_login() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;

        let reg = auth.register(request("ana@example.com")).await.unwrap();
        assert!(reg.user_id > 0);

        assert!(matches!(
            auth.login("ana@example.com", "secret123").await,
            Err(AccountError::NotVerified)
        ));
        let wrong = if reg.verification_code == "AAAAAA" { "BBBBBB" } else { "AAAAAA" };
        assert!(!auth.verify_code("ana@example.com", wrong).await.unwrap());
        assert!(auth
            .verify_code("ana@example.com", &reg.verification_code)
            .await
            .unwrap());

        let account = auth.login("ana@example.com", "secret123").await.unwrap();
        assert_eq!(account.id, reg.user_id);
        assert!(account.is_verified);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;

        auth.register(request("dup@example.com")).await.unwrap();
        let err = auth.register(request("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail(ref e) if e == "dup@example.com"));
        assert_eq!(auth.count_users(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;
        let mut req = request("x@example.com");
        req.nickname = "  ".to_string();
        assert!(matches!(
            auth.register(req).await,
            Err(AccountError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failure_order() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;
        auth.register(request("ana@example.com")).await.unwrap();

        assert!(matches!(
            auth.login("nobody@example.com", "secret123").await,
            Err(AccountError::UnknownEmail)
        ));
        // Wrong password wins over unverified.
        assert!(matches!(
            auth.login("ana@example.com", "wrong").await,
            Err(AccountError::WrongPassword)
        ));
    }

    #[tokio::test]
    async fn test_profile_update_duplicate_returns_false() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;
        let a = verified_user(&auth, "a@example.com").await;
        verified_user(&auth, "b@example.com").await;

        let ok = auth
            .update_user_profile(a, "Ana", "b@example.com", None)
            .await
            .unwrap();
        assert!(!ok);
        let profile = auth.get_user_profile(a).await.unwrap().unwrap();
        assert_eq!(profile.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_profile_update_changes_password_only_when_given() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;
        let id = verified_user(&auth, "a@example.com").await;

        assert!(auth
            .update_user_profile(id, "Anita", "a@example.com", None)
            .await
            .unwrap());
        auth.login("a@example.com", "secret123").await.unwrap();

        assert!(auth
            .update_user_profile(id, "Anita", "a@example.com", Some("newpass"))
            .await
            .unwrap());
        assert!(matches!(
            auth.login("a@example.com", "secret123").await,
            Err(AccountError::WrongPassword)
        ));
        let account = auth.login("a@example.com", "newpass").await.unwrap();
        assert_eq!(account.nickname, "Anita");
    }

    #[tokio::test]
    async fn test_get_user_profile_formats_date() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;
        let id = verified_user(&auth, "a@example.com").await;

        let profile = auth.get_user_profile(id).await.unwrap().unwrap();
        assert_eq!(profile.created_at.len(), 10);
        assert_eq!(&profile.created_at[2..3], "/");
        assert!(auth.get_user_profile(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reissue_stores_new_code() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;
        auth.register(request("ana@example.com")).await.unwrap();

        let code = auth
            .reissue_verification_code("ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(auth.verify_code("ana@example.com", &code).await.unwrap());

        // Already verified and unknown emails get nothing.
        assert!(auth
            .reissue_verification_code("ana@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(auth
            .reissue_verification_code("ghost@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_admin_listing_and_delete() {
        let dir = TempDir::new().unwrap();
        let auth = controller(&dir).await;
        let a = verified_user(&auth, "alpha@example.com").await;
        verified_user(&auth, "beta@example.com").await;

        assert_eq!(auth.count_users(Some("ALPHA")).await.unwrap(), 1);
        let page = auth
            .list_users(None, Pagination::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);

        let update = AdminUserUpdate {
            nickname: "Al".to_string(),
            email: "beta@example.com".to_string(),
            is_verified: true,
        };
        assert!(!auth.admin_update_user(a, &update).await.unwrap());

        assert!(auth.delete_user(a).await.unwrap());
        assert!(!auth.delete_user(a).await.unwrap());
        assert_eq!(auth.count_users(None).await.unwrap(), 1);
    }
}
