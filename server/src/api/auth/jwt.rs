//! JWT session token handling

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT validation error
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Session token has expired")]
    Expired,

    #[error("Invalid session token signature")]
    InvalidSignature,

    #[error("Invalid session token: {0}")]
    Invalid(String),
}

/// JWT claims for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl SessionClaims {
    pub fn new(user_id: &str, ttl_hours: u32) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(i64::from(ttl_hours));

        Self {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Create a signed JWT session token
pub fn create_session_token(
    signing_key: &[u8],
    user_id: &str,
    ttl_hours: u32,
) -> Result<(String, SessionClaims), JwtError> {
    let claims = SessionClaims::new(user_id, ttl_hours);
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .map_err(|e| JwtError::Invalid(e.to_string()))?;
    Ok((token, claims))
}

/// Validate and decode a JWT session token
pub fn validate_session_token(token: &str, signing_key: &[u8]) -> Result<SessionClaims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;

    let token_data =
        decode::<SessionClaims>(token, &DecodingKey::from_secret(signing_key), &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::Invalid(e.to_string()),
            })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> Vec<u8> {
        vec![0u8; 32]
    }

    #[test]
    fn test_create_and_validate() {
        let key = test_key();
        let (token, issued) = create_session_token(&key, "user123", 24).unwrap();
        let claims = validate_session_token(&token, &key).unwrap();
        assert_eq!(claims.user_id(), "user123");
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_invalid_signature() {
        let (token, _) = create_session_token(&[0u8; 32], "u", 1).unwrap();
        assert!(matches!(
            validate_session_token(&token, &[1u8; 32]),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired() {
        let mut claims = SessionClaims::new("u", 1);
        claims.iat -= 7200;
        claims.exp -= 7200;
        let key = test_key();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&key),
        )
        .unwrap();
        assert!(matches!(
            validate_session_token(&token, &key),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            validate_session_token("not-a-jwt", &test_key()),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_unique_jti() {
        let c1 = SessionClaims::new("u", 1);
        let c2 = SessionClaims::new("u", 1);
        assert_ne!(c1.jti, c2.jti);
    }
}
