use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Invalid password hash format: {0}")]
    MalformedHash(String),
}

/// Hashes passwords for storage and checks them at login
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, CredentialError>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError>;
}

/// Argon2id with the crate's default parameters; hashes are PHC strings
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Credentials;

impl CredentialVerifier for Argon2Credentials {
    fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(hash).map_err(|e| CredentialError::MalformedHash(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
