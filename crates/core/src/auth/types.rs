use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// Value of a cookie from the `cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers.get("cookie")?.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
    }
}

/// Authenticated user. The admin capability is fixed when the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub nickname: String,
    pub is_admin: bool,
}

impl Identity {
    /// Build an identity, granting admin when `email` matches `admin_email`
    /// case-insensitively.
    pub fn resolve(user_id: i64, email: &str, nickname: &str, admin_email: &str) -> Self {
        let email = email.trim();
        Self {
            user_id,
            email: email.to_string(),
            nickname: nickname.to_string(),
            is_admin: !admin_email.trim().is_empty()
                && email.eq_ignore_ascii_case(admin_email.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_admin_case_insensitive() {
        let admin = Identity::resolve(1, "VibesCine10@Gmail.com", "boss", "vibescine10@gmail.com");
        assert!(admin.is_admin);

        let user = Identity::resolve(2, "fan@example.com", "fan", "vibescine10@gmail.com");
        assert!(!user.is_admin);

        let nobody = Identity::resolve(3, "", "x", "");
        assert!(!nobody.is_admin);
    }

    #[test]
    fn test_cookie_lookup() {
        let request = AuthRequest {
            headers: HashMap::from([(
                "cookie".to_string(),
                "theme=dark; cinevibes_session=abc.def".to_string(),
            )]),
            source_ip: "127.0.0.1".parse().unwrap(),
        };
        assert_eq!(request.cookie("cinevibes_session"), Some("abc.def"));
        assert_eq!(request.cookie("theme"), Some("dark"));
        assert_eq!(request.cookie("missing"), None);
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity::resolve(7, "a@b.c", "ana", "admin@b.c");
        let json = serde_json::to_string(&identity).unwrap();
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }
}
