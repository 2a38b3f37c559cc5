use chrono::Duration;
use std::sync::Arc;

use crate::auth::{
    Argon2Credentials, CredentialVerifier, JwtTokenService, MemoryExpiringStore, TokenError, TokenService,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, SecurityConfig};
use crate::database::Store;
use crate::services::{
    AccountService, AttachmentService, CommentService, EventService, FamilyService, FolderService, NoteService,
    PendingRegistration, RegistrationKey,
};
use crate::storage::BlobStore;
use crate::visibility::VisibilityResolver;

/// Everything a request handler needs, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<dyn TokenService>,
    pub accounts: AccountService,
    pub families: FamilyService,
    pub notes: NoteService,
    pub events: EventService,
    pub folders: FolderService,
    pub comments: CommentService,
    pub attachments: AttachmentService,
    pub security: SecurityConfig,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Production wiring: Argon2 credentials and the system clock.
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>, config: &AppConfig) -> Result<Self, TokenError> {
        Self::with_parts(store, blobs, Arc::new(Argon2Credentials), Arc::new(SystemClock), config)
    }

    pub fn with_parts(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        credentials: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Result<Self, TokenError> {
        let security = &config.security;
        let tokens: Arc<dyn TokenService> =
            Arc::new(JwtTokenService::new(&security.jwt_secret, security.jwt_expiry_hours)?);
        let codes = Arc::new(MemoryExpiringStore::<RegistrationKey, PendingRegistration>::new(clock.clone()));

        let resolver = VisibilityResolver::new(store.clone());
        let notes = NoteService::new(
            store.clone(),
            resolver.clone(),
            clock.clone(),
            Duration::hours(config.notes.undelete_window_hours as i64),
            config.notes.search_limit,
        );

        Ok(Self {
            accounts: AccountService::new(
                store.clone(),
                credentials,
                tokens.clone(),
                codes,
                clock.clone(),
                Duration::seconds(config.registration.code_ttl_secs as i64),
                config.registration.code_length,
                Duration::hours(security.jwt_expiry_hours as i64),
            ),
            families: FamilyService::new(store.clone(), resolver.clone(), clock.clone()),
            events: EventService::new(store.clone(), resolver, clock.clone()),
            folders: FolderService::new(store.clone(), clock.clone()),
            comments: CommentService::new(store.clone(), notes.clone(), clock.clone()),
            attachments: AttachmentService::new(
                store.clone(),
                blobs,
                notes.clone(),
                clock,
                config.uploads.max_bytes,
            ),
            notes,
            store,
            tokens,
            security: security.clone(),
            max_upload_bytes: config.uploads.max_bytes,
        })
    }
}
