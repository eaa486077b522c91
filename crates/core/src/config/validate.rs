use super::{types::Config, ConfigError};

/// Validate configuration.
///
/// Rejects settings the server cannot start with: a zero port, an empty
/// session key, a zero upload limit, an out-of-range bcrypt cost, mail
/// without credentials and half-configured object storage.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.secret_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "auth.secret_key cannot be empty".to_string(),
        ));
    }

    if !(4..=31).contains(&config.auth.password_hash_cost) {
        return Err(ConfigError::ValidationError(format!(
            "auth.password_hash_cost must be between 4 and 31, got {}",
            config.auth.password_hash_cost
        )));
    }

    if config.uploads.max_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "uploads.max_bytes cannot be 0".to_string(),
        ));
    }

    if let Some(mail) = &config.mail {
        if mail.sender.is_empty() {
            return Err(ConfigError::ValidationError(
                "mail.sender cannot be empty".to_string(),
            ));
        }
        if mail.password.is_empty() {
            return Err(ConfigError::ValidationError(
                "mail.password must be set when mail.sender is configured".to_string(),
            ));
        }
    }

    if let Some(storage) = &config.storage {
        if !storage.is_complete() {
            return Err(ConfigError::ValidationError(
                "storage requires url, key and bucket".to_string(),
            ));
        }
    }

    Ok(())
}
