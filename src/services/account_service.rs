use chrono::Duration;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::verification::generate_code;
use crate::auth::{CredentialVerifier, ExpiringStore, TokenService};
use crate::clock::Clock;
use crate::database::models::{User, UserSummary};
use crate::database::Store;

use super::CoreError;

const INVALID_CREDENTIALS: &str = "Invalid username or password";
const SEARCH_LIMIT: i64 = 5;

const AVATAR_COLORS: &[&str] = &[
    "#F87171", "#FB923C", "#FBBF24", "#34D399", "#22D3EE", "#60A5FA", "#A78BFA", "#F472B6",
];

/// `(username, code)`. Kept as a pair so no username can spell another's key.
pub type RegistrationKey = (String, String);

/// Credentials waiting for their verification code
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationTicket {
    pub username: String,
    pub expires_in: i64,
    /// Delivered out of band, never in a response body.
    #[serde(skip_serializing)]
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
    pub expires_in: i64,
}

/// Registration, login and user lookup
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    credentials: Arc<dyn CredentialVerifier>,
    tokens: Arc<dyn TokenService>,
    codes: Arc<dyn ExpiringStore<RegistrationKey, PendingRegistration>>,
    clock: Arc<dyn Clock>,
    code_ttl: Duration,
    code_length: usize,
    token_ttl: Duration,
}

impl AccountService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        credentials: Arc<dyn CredentialVerifier>,
        tokens: Arc<dyn TokenService>,
        codes: Arc<dyn ExpiringStore<RegistrationKey, PendingRegistration>>,
        clock: Arc<dyn Clock>,
        code_ttl: Duration,
        code_length: usize,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            credentials,
            tokens,
            codes,
            clock,
            code_ttl,
            code_length,
            token_ttl,
        }
    }

    /// Unknown users and wrong passwords fail identically.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, CoreError> {
        let user = match self.store.find_user_by_username(username.trim()).await? {
            Some(user) => user,
            None => {
                warn!("Login failed for unknown user {}", username);
                return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !self.credentials.verify(password, &user.password_hash)? {
            warn!("Login failed for user {}: wrong password", user.id);
            return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        info!("User {} logged in", user.id);
        self.outcome(user)
    }

    /// Validates the request and parks the hashed password behind a
    /// one-shot code.
    pub async fn request_registration(&self, username: &str, password: &str) -> Result<RegistrationTicket, CoreError> {
        let username = username.trim();
        let length = username.chars().count();
        if !(3..=20).contains(&length) {
            return Err(CoreError::ValidationFailed(
                "Username must be 3 to 20 characters".to_string(),
            ));
        }
        if password.chars().count() < 6 {
            return Err(CoreError::ValidationFailed(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        if self.store.find_user_by_username(username).await?.is_some() {
            return Err(CoreError::Conflict(format!("Username '{}' is taken", username)));
        }

        let pending = PendingRegistration {
            password_hash: self.credentials.hash(password)?,
        };
        let code = generate_code(self.code_length);
        self.codes.put(registration_key(username, &code), pending, self.code_ttl);

        info!("Verification code for {}: {}", username, code);
        Ok(RegistrationTicket {
            username: username.to_string(),
            expires_in: self.code_ttl.num_seconds(),
            code,
        })
    }

    /// Consumes the code and creates the account.
    pub async fn verify_registration(&self, username: &str, code: &str) -> Result<LoginOutcome, CoreError> {
        let username = username.trim();
        let pending = self
            .codes
            .take_if_present(&registration_key(username, code.trim()))
            .ok_or_else(|| {
                warn!("Invalid or expired verification code for {}", username);
                CoreError::Unauthorized("Invalid or expired verification code".to_string())
            })?;

        let now = self.clock.now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: pending.password_hash,
            avatar_color: random_avatar_color(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(&user).await?;

        info!("Registered user {} ({})", user.id, user.username);
        self.outcome(user)
    }

    pub async fn whoami(&self, actor: Uuid) -> Result<User, CoreError> {
        self.store
            .find_user(actor)
            .await?
            .ok_or_else(|| CoreError::Unauthorized("Unknown user".to_string()))
    }

    /// Substring match on username, at most five results.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, CoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let users = self.store.search_users(query, SEARCH_LIMIT).await?;
        Ok(users.iter().map(UserSummary::from).collect())
    }

    fn outcome(&self, user: User) -> Result<LoginOutcome, CoreError> {
        let token = self.tokens.issue(user.id, &user.username)?;
        Ok(LoginOutcome {
            token,
            user,
            expires_in: self.token_ttl.num_seconds(),
        })
    }
}

fn registration_key(username: &str, code: &str) -> RegistrationKey {
    (username.to_string(), code.to_string())
}

fn random_avatar_color() -> String {
    AVATAR_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("#60A5FA")
        .to_string()
}
