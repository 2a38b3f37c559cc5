pub mod account_service;
pub mod attachment_service;
pub mod comment_service;
pub mod event_service;
pub mod family_service;
pub mod folder_service;
pub mod migration;
pub mod note_service;

use thiserror::Error;

use crate::auth::{CredentialError, TokenError};
use crate::database::StoreError;
use crate::storage::BlobError;

pub use account_service::{AccountService, LoginOutcome, PendingRegistration, RegistrationKey, RegistrationTicket};
pub use attachment_service::{AttachmentService, Download, Upload};
pub use comment_service::{CommentService, NewComment};
pub use event_service::{EventFilter, EventPatch, EventService, NewEvent, SeedReport};
pub use family_service::{CreatedFamily, FamilyService};
pub use folder_service::{FolderService, NewFolder};
pub use note_service::{NewNote, NoteFilter, NoteService};

/// Errors surfaced by the core operations. Every variant is recoverable at
/// the request boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    NotFound(String),

    /// Authenticated but not allowed. Also returned for families the actor
    /// cannot see, so family existence does not leak.
    #[error("{0}")]
    Forbidden(String),

    #[error("User is already a member of this family")]
    AlreadyMember,

    #[error("User is not a member of this family")]
    NotAMember,

    #[error("Family not found")]
    FamilyNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::FamilyNotFound => CoreError::FamilyNotFound,
            StoreError::AlreadyMember => CoreError::AlreadyMember,
            StoreError::NotAMember => CoreError::NotAMember,
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            other => CoreError::Store(other),
        }
    }
}

/// Trims `value` and checks it is non-empty and at most `max` characters.
pub(crate) fn validate_name(field: &str, value: &str, max: usize) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationFailed(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max {
        return Err(CoreError::ValidationFailed(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}
