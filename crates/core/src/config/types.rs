use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Outbound email. Sends are skipped when absent.
    #[serde(default)]
    pub mail: Option<MailConfig>,
    /// Remote object storage for profile pictures. Local disk is used when absent.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5000
}

/// Database configuration.
///
/// When `url` is set every connection goes to PostgreSQL, otherwise to the
/// SQLite file at `path`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            url: None,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("database/cinevibes.db")
}

/// Session and account configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Key used to sign session cookies.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// Account that receives the admin capability on login.
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: u32,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            admin_email: default_admin_email(),
            session_ttl_days: default_session_ttl_days(),
            password_hash_cost: default_password_hash_cost(),
        }
    }
}

fn default_secret_key() -> String {
    "cinevibes-dev-secret".to_string()
}

fn default_admin_email() -> String {
    "vibescine10@gmail.com".to_string()
}

fn default_session_ttl_days() -> u32 {
    30
}

fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

/// Uploaded files and static serving
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadsConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_static_max_age")]
    pub static_max_age_secs: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_bytes: default_max_bytes(),
            static_max_age_secs: default_static_max_age(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("static/uploads")
}

fn default_max_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_static_max_age() -> u64 {
    3600
}

/// OMDb metadata client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL (default: http://www.omdbapi.com/).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_metadata_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,
    #[serde(default = "default_detail_ttl")]
    pub detail_ttl_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: default_metadata_timeout(),
            search_ttl_secs: default_search_ttl(),
            detail_ttl_secs: default_detail_ttl(),
        }
    }
}

fn default_metadata_timeout() -> u64 {
    10
}

fn default_search_ttl() -> u64 {
    30
}

fn default_detail_ttl() -> u64 {
    60
}

/// SMTP configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    pub sender: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
    /// Where movie requests are delivered.
    #[serde(default = "default_requests_recipient")]
    pub requests_recipient: String,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_mail_timeout() -> u64 {
    20
}

fn default_requests_recipient() -> String {
    "vibescine10@gmail.com".to_string()
}

/// Supabase-style object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl StorageConfig {
    /// Remote storage is used only when every field is present.
    pub fn is_complete(&self) -> bool {
        !self.url.is_empty() && !self.key.is_empty() && !self.bucket.is_empty()
    }
}

fn default_bucket() -> String {
    "profile-pics".to_string()
}

/// Query cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    60
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: SanitizedDatabaseConfig,
    pub auth: SanitizedAuthConfig,
    pub uploads: UploadsConfig,
    pub metadata: SanitizedMetadataConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<SanitizedMailConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<SanitizedStorageConfig>,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDatabaseConfig {
    pub backend: String,
    pub path: PathBuf,
    pub url_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub secret_key_configured: bool,
    pub admin_email: String,
    pub session_ttl_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMetadataConfig {
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

/// Sanitized mail config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMailConfig {
    pub sender: String,
    pub password_configured: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
}

/// Sanitized storage config (key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub url: String,
    pub key_configured: bool,
    pub bucket: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: SanitizedDatabaseConfig {
                backend: if config.database.url.is_some() {
                    "postgres".to_string()
                } else {
                    "sqlite".to_string()
                },
                path: config.database.path.clone(),
                url_configured: config.database.url.is_some(),
            },
            auth: SanitizedAuthConfig {
                secret_key_configured: !config.auth.secret_key.is_empty(),
                admin_email: config.auth.admin_email.clone(),
                session_ttl_days: config.auth.session_ttl_days,
            },
            uploads: config.uploads.clone(),
            metadata: SanitizedMetadataConfig {
                api_key_configured: config
                    .metadata
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                timeout_secs: config.metadata.timeout_secs,
            },
            mail: config.mail.as_ref().map(|m| SanitizedMailConfig {
                sender: m.sender.clone(),
                password_configured: !m.password.is_empty(),
                smtp_host: m.smtp_host.clone(),
                smtp_port: m.smtp_port,
            }),
            storage: config.storage.as_ref().map(|s| SanitizedStorageConfig {
                url: s.url.clone(),
                key_configured: !s.key.is_empty(),
                bucket: s.bucket.clone(),
            }),
            cache: config.cache.clone(),
        }
    }
}
