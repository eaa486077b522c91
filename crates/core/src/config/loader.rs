use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Flat environment variables understood for deployment compatibility,
/// mapped onto their nested configuration keys.
const FLAT_ENV_KEYS: &[(&str, &str)] = &[
    ("SECRET_KEY", "auth.secret_key"),
    ("ADMIN_EMAIL", "auth.admin_email"),
    ("DB_PATH", "database.path"),
    ("DATABASE_URL", "database.url"),
    ("UPLOAD_FOLDER", "uploads.dir"),
    ("MAX_CONTENT_LENGTH", "uploads.max_bytes"),
    ("STATIC_MAX_AGE", "uploads.static_max_age_secs"),
    ("OMDB_API_KEY", "metadata.api_key"),
    ("EMAIL_SENDER", "mail.sender"),
    ("EMAIL_PASSWORD", "mail.password"),
    ("SUPABASE_URL", "storage.url"),
    ("SUPABASE_SERVICE_KEY", "storage.key"),
    ("SUPABASE_BUCKET", "storage.bucket"),
    ("PORT", "server.port"),
];

fn flat_env() -> Env {
    let names: Vec<&str> = FLAT_ENV_KEYS.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        FLAT_ENV_KEYS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
            .unwrap_or_else(|| key.as_str().to_owned().into())
    })
}

fn with_env(figment: Figment) -> Figment {
    figment
        .merge(flat_env())
        .merge(Env::prefixed("CINEVIBES_").split("__"))
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    with_env(Figment::new().merge(Toml::file(path)))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from defaults and environment variables only
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    with_env(Figment::new())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
