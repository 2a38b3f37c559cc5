pub mod password;
pub mod verification;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use password::{Argon2Credentials, CredentialError, CredentialVerifier};
pub use verification::{ExpiringStore, MemoryExpiringStore};

const ISSUER: &str = "family-notes-api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

/// Identity recovered from a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,
}

/// Issues and parses bearer tokens
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: Uuid, username: &str) -> Result<String, TokenError>;
    fn parse(&self, token: &str) -> Result<TokenIdentity, TokenError>;
}

/// HS256 JWT implementation of [`TokenService`]
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl JwtTokenService {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry: Duration::hours(expiry_hours as i64),
        })
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, user_id: Uuid, username: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            username: username.to_string(),
            iss: ISSUER.to_string(),
            exp: (now + self.expiry).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::TokenGeneration(e.to_string()))
    }

    fn parse(&self, token: &str) -> Result<TokenIdentity, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))?;

        Ok(TokenIdentity {
            user_id: data.claims.user_id,
            username: data.claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_parses_back_to_identity() {
        let service = JwtTokenService::new("secret", 1).unwrap();
        let user_id = Uuid::new_v4();
        let token = service.issue(user_id, "alice").unwrap();

        let identity = service.parse(&token).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = JwtTokenService::new("secret-a", 1).unwrap();
        let verifier = JwtTokenService::new("secret-b", 1).unwrap();
        let token = issuer.issue(Uuid::new_v4(), "alice").unwrap();

        assert!(matches!(verifier.parse(&token), Err(TokenError::InvalidToken(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(JwtTokenService::new("", 1), Err(TokenError::InvalidSecret)));
    }
}
