//! Authentication manager

use super::jwt::{JwtError, SessionClaims, create_session_token, validate_session_token};
use crate::core::SecretManager;

/// Issues and validates session tokens with the server signing key
pub struct AuthManager {
    signing_key: Vec<u8>,
    token_ttl_hours: u32,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("signing_key", &"[REDACTED]")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

impl AuthManager {
    pub fn new(secrets: &SecretManager, token_ttl_hours: u32) -> Self {
        tracing::debug!(token_ttl_hours, "Authentication manager initialized");
        Self::with_key(secrets.jwt_signing_key().to_vec(), token_ttl_hours)
    }

    pub fn with_key(signing_key: Vec<u8>, token_ttl_hours: u32) -> Self {
        Self {
            signing_key,
            token_ttl_hours,
        }
    }

    /// Issue a session token for a user
    pub fn issue(&self, user_id: &str) -> Result<(String, SessionClaims), JwtError> {
        create_session_token(&self.signing_key, user_id, self.token_ttl_hours)
    }

    /// Validate a JWT session token
    pub fn validate_session(&self, jwt: &str) -> Result<SessionClaims, JwtError> {
        validate_session_token(jwt, &self.signing_key)
    }
}
