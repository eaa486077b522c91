mod session;
mod traits;
mod types;

pub use session::*;
pub use traits::*;
pub use types::*;

use std::sync::Arc;

use crate::config::AuthConfig;

/// Build the session store and its cookie authenticator from config.
pub fn create_authenticator(
    config: &AuthConfig,
) -> Result<(Arc<SessionStore>, SessionSigner, SessionAuthenticator), AuthError> {
    if config.secret_key.trim().is_empty() {
        return Err(AuthError::ConfigurationError(
            "auth.secret_key must be set".to_string(),
        ));
    }
    let store = Arc::new(SessionStore::with_ttl_days(config.session_ttl_days));
    let signer = SessionSigner::new(config.secret_key.clone());
    let authenticator = SessionAuthenticator::new(store.clone(), signer.clone());
    Ok((store, signer, authenticator))
}
