use std::sync::Arc;
use std::time::Duration;

use cinevibes_core::mail::{deliver, verification_email};
use cinevibes_core::{
    create_authenticator, AuthController, AuthError, Authenticator, AvatarStorage, Cache,
    CachedQueries, Config, Database, Identity, Mailer, MemoryCacheStore, MetadataProvider,
    MovieController, ReviewController, SanitizedConfig, SessionSigner, SessionStore,
};
use tracing::warn;

/// Shared application state
pub struct AppState {
    config: Config,
    accounts: AuthController,
    movies: MovieController,
    reviews: ReviewController,
    queries: CachedQueries,
    sessions: Arc<SessionStore>,
    signer: SessionSigner,
    authenticator: Arc<dyn Authenticator>,
    mailer: Option<Arc<dyn Mailer>>,
    avatars: Arc<dyn AvatarStorage>,
}

impl AppState {
    /// Wire the controllers, the query cache and the session layer.
    pub fn new(
        config: Config,
        db: Database,
        metadata: Arc<dyn MetadataProvider>,
        mailer: Option<Arc<dyn Mailer>>,
        avatars: Arc<dyn AvatarStorage>,
    ) -> Result<Self, AuthError> {
        let (sessions, signer, authenticator) = create_authenticator(&config.auth)?;

        let cache = Cache::new(
            Arc::new(MemoryCacheStore::new()),
            Duration::from_secs(config.cache.ttl_secs),
        );
        let accounts = AuthController::new(db.clone(), config.auth.password_hash_cost);
        let movies = MovieController::new(db.clone(), metadata).with_cache(cache.clone());
        let reviews = ReviewController::new(db);
        let queries = CachedQueries::new(cache, movies.clone(), accounts.clone());

        Ok(Self {
            config,
            accounts,
            movies,
            reviews,
            queries,
            sessions,
            signer,
            authenticator: Arc::new(authenticator),
            mailer,
            avatars,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn accounts(&self) -> &AuthController {
        &self.accounts
    }

    pub fn movies(&self) -> &MovieController {
        &self.movies
    }

    pub fn reviews(&self) -> &ReviewController {
        &self.reviews
    }

    pub fn queries(&self) -> &CachedQueries {
        &self.queries
    }

    pub fn sessions(&self) -> &SessionStore {
        self.sessions.as_ref()
    }

    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn mailer(&self) -> Option<&dyn Mailer> {
        self.mailer.as_deref()
    }

    pub fn avatars(&self) -> &dyn AvatarStorage {
        self.avatars.as_ref()
    }

    /// Identity for a user, with the admin capability resolved from config.
    pub fn identity_for(&self, user_id: i64, email: &str, nickname: &str) -> Identity {
        Identity::resolve(user_id, email, nickname, &self.config.auth.admin_email)
    }

    /// Where movie requests go: `mail.requests_recipient`, else the admin.
    pub fn requests_recipient(&self) -> &str {
        self.config
            .mail
            .as_ref()
            .map(|m| m.requests_recipient.as_str())
            .unwrap_or(self.config.auth.admin_email.as_str())
    }

    /// Mail a verification code. Failures are logged and never surface.
    pub async fn send_verification(&self, email: &str, code: &str) {
        match self.mailer() {
            Some(mailer) => {
                let _ = deliver(mailer, verification_email(email, code)).await;
            }
            None => warn!(email, "No mailer configured, verification code not sent"),
        }
    }
}
