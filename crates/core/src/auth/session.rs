//! Cookie sessions kept in process memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "cinevibes_session";

struct Session {
    identity: Identity,
    expires_at: Instant,
}

/// Live sessions by token.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn with_ttl_days(days: u32) -> Self {
        Self::new(Duration::from_secs(u64::from(days) * 24 * 60 * 60))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session and return its raw token.
    pub async fn create(&self, identity: Identity) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > now);
        debug!(user_id = identity.user_id, "Session created");
        sessions.insert(
            token.clone(),
            Session {
                identity,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub async fn get(&self, token: &str) -> Option<Identity> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| s.expires_at > Instant::now())
            .map(|s| s.identity.clone())
    }

    /// Replace the identity of every session of `identity.user_id`.
    pub async fn refresh(&self, identity: &Identity) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut() {
            if session.identity.user_id == identity.user_id {
                session.identity = identity.clone();
            }
        }
    }

    pub async fn revoke(&self, token: &str) -> Option<Identity> {
        self.sessions
            .write()
            .await
            .remove(token)
            .map(|s| s.identity)
    }

    /// End every session of a user. Returns how many were removed.
    pub async fn revoke_user(&self, user_id: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.identity.user_id != user_id);
        before - sessions.len()
    }
}

/// Signs session tokens for the cookie as `token.hex(sha256(secret:token))`.
#[derive(Clone)]
pub struct SessionSigner {
    secret: String,
}

impl SessionSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign(&self, token: &str) -> String {
        format!("{}.{}", token, self.mac(token))
    }

    /// The raw token when the signature is valid.
    pub fn verify<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (token, mac) = value.rsplit_once('.')?;
        constant_time_eq(mac.as_bytes(), self.mac(token).as_bytes()).then_some(token)
    }

    fn mac(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(token.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Authenticates requests by their session cookie.
pub struct SessionAuthenticator {
    store: Arc<SessionStore>,
    signer: SessionSigner,
}

impl SessionAuthenticator {
    pub fn new(store: Arc<SessionStore>, signer: SessionSigner) -> Self {
        Self { store, signer }
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let cookie = request
            .cookie(SESSION_COOKIE)
            .ok_or(AuthError::NotAuthenticated)?;
        let token = self
            .signer
            .verify(cookie)
            .ok_or_else(|| AuthError::InvalidCredentials("Bad session signature".to_string()))?;
        self.store.get(token).await.ok_or(AuthError::SessionExpired)
    }

    fn method_name(&self) -> &'static str {
        "session"
    }
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn identity(id: i64) -> Identity {
        Identity::resolve(id, &format!("u{}@example.com", id), "user", "admin@example.com")
    }

    fn make_request(cookie: Option<&str>) -> AuthRequest {
        AuthRequest {
            headers: cookie
                .map(|c| ("cookie".to_string(), c.to_string()))
                .into_iter()
                .collect(),
            source_ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = SessionSigner::new("secret");
        let signed = signer.sign("abc123");
        assert_eq!(signer.verify(&signed), Some("abc123"));

        let tampered = signed.replacen("abc123", "abc124", 1);
        assert_eq!(signer.verify(&tampered), None);
        assert_eq!(SessionSigner::new("other").verify(&signed), None);
        assert_eq!(signer.verify("no-dot"), None);
    }

    #[tokio::test]
    async fn test_store_lifecycle() {
        let store = SessionStore::with_ttl_days(30);
        let a = store.create(identity(1)).await;
        let b = store.create(identity(1)).await;
        store.create(identity(2)).await;

        assert_eq!(store.get(&a).await.unwrap().user_id, 1);

        let mut renamed = identity(1);
        renamed.nickname = "renamed".to_string();
        store.refresh(&renamed).await;
        assert_eq!(store.get(&b).await.unwrap().nickname, "renamed");

        assert!(store.revoke(&a).await.is_some());
        assert!(store.get(&a).await.is_none());
        assert_eq!(store.revoke_user(1).await, 1);
        assert!(store.get(&b).await.is_none());
    }

    #[tokio::test]
    async fn test_sessions_expire() {
        let store = SessionStore::new(Duration::from_millis(20));
        let token = store.create(identity(1)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_authenticator() {
        let store = Arc::new(SessionStore::with_ttl_days(1));
        let signer = SessionSigner::new("secret");
        let auth = SessionAuthenticator::new(store.clone(), signer.clone());
        assert_eq!(auth.method_name(), "session");

        assert!(matches!(
            auth.authenticate(&make_request(None)).await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            auth.authenticate(&make_request(Some("cinevibes_session=forged.deadbeef")))
                .await,
            Err(AuthError::InvalidCredentials(_))
        ));

        let token = store.create(identity(5)).await;
        let cookie = format!("{}={}", SESSION_COOKIE, signer.sign(&token));
        let found = auth.authenticate(&make_request(Some(&cookie))).await.unwrap();
        assert_eq!(found.user_id, 5);

        store.revoke(&token).await;
        assert!(matches!(
            auth.authenticate(&make_request(Some(&cookie))).await,
            Err(AuthError::SessionExpired)
        ));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(constant_time_eq(b"", b""));
    }
}
