//! Authentication configuration resolved at startup.

use crate::auth::AuthError;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL_HOURS: u32 = 24;

/// Token signing configuration.
///
/// A missing secret is representable on purpose: the server still starts, logs the problem
/// and answers every token operation with a configuration error.
#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: Option<String>,
    token_ttl_hours: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

impl AuthConfig {
    /// Blank secrets count as missing.
    pub fn new(jwt_secret: Option<String>, token_ttl_hours: u32) -> Result<Self, AuthError> {
        if token_ttl_hours == 0 {
            return Err(AuthError::InvalidConfig(
                "token lifetime must be at least one hour".into(),
            ));
        }
        Ok(Self {
            jwt_secret: jwt_secret.filter(|s| !s.trim().is_empty()),
            token_ttl_hours,
        })
    }

    pub fn jwt_secret(&self) -> Option<&str> {
        self.jwt_secret.as_deref()
    }

    pub fn token_ttl_hours(&self) -> u32 {
        self.token_ttl_hours
    }
}

/// Parse `CURAMIND_TOKEN_TTL_HOURS`, falling back to [`DEFAULT_TOKEN_TTL_HOURS`].
pub fn token_ttl_from_env_value(value: Option<String>) -> Result<u32, AuthError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_TOKEN_TTL_HOURS),
        Some(v) => v.parse::<u32>().map_err(|_| {
            AuthError::InvalidConfig(format!("token lifetime must be a number of hours, got '{v}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_secret_is_missing() {
        let cfg = AuthConfig::new(Some("   ".into()), 24).unwrap();
        assert!(cfg.jwt_secret().is_none());
        assert!(!format!("{cfg:?}").contains("   "));
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = AuthConfig::new(Some("hunter2".into()), 24).unwrap();
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }

    #[test]
    fn ttl_parsing() {
        assert_eq!(token_ttl_from_env_value(None).unwrap(), DEFAULT_TOKEN_TTL_HOURS);
        assert_eq!(token_ttl_from_env_value(Some("8".into())).unwrap(), 8);
        assert!(token_ttl_from_env_value(Some("a day".into())).is_err());
        assert!(AuthConfig::new(None, 0).is_err());
    }
}
