pub mod accounts;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod mail;
pub mod metadata;
pub mod metrics;
pub mod movies;
pub mod pagination;
pub mod reviews;
pub mod schema;
pub mod storage;
pub mod testing;

pub use accounts::{AccountError, AuthController};
pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, SessionAuthenticator,
    SessionSigner, SessionStore, SESSION_COOKIE,
};
pub use cache::{Cache, CacheKey, CacheStore, CachedQueries, MemoryCacheStore};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use db::{Backend, Connection, Database, DbError};
pub use mail::{Mailer, SmtpMailer};
pub use metadata::{MetadataProvider, OmdbClient, UnconfiguredProvider};
pub use movies::{MovieController, MovieError};
pub use pagination::{Page, Pagination};
pub use reviews::{ReviewController, ReviewError};
pub use storage::{AvatarStorage, LocalAvatarStorage, SupabaseStorage};
