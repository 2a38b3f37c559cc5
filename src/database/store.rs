use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    Attachment, Collaborator, Comment, Event, Family, FamilyMember, FamilyMembership, FamilyRole, Folder,
    MemberEntry, Note, User,
};
use crate::visibility::Visibility;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Family not found")]
    FamilyNotFound,

    #[error("User is already a member of this family")]
    AlreadyMember,

    #[error("User is not a member of this family")]
    NotAMember,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Outcome of removing one membership row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub role: FamilyRole,
    pub remaining_members: i64,
    /// The family had no members left and was deleted in the same transaction.
    pub family_deleted: bool,
}

/// A new family with everything written alongside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilySeed {
    pub family: Family,
    /// Owner first
    pub members: Vec<FamilyMember>,
    pub shared_folder: Folder,
}

impl FamilySeed {
    pub fn new(family: Family, members: Vec<FamilyMember>) -> Self {
        let shared_folder = Folder::shared_for(&family);
        Self {
            family,
            members,
            shared_folder,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoteQuery {
    pub visibility: Visibility,
    pub folder_id: Option<Uuid>,
    /// Case-insensitive substring match on title or content
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct EventQuery {
    pub visibility: Visibility,
    /// Inclusive date range
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Relational store behind the core. Compound membership writes are atomic.
///
/// Soft-deleted notes and events are never returned by `select_*`;
/// `find_note`/`find_event` return them so owners can restore.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // Users
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<User>, StoreError>;

    // Membership
    async fn find_family(&self, id: Uuid) -> Result<Option<Family>, StoreError>;

    /// Inserts the family, its memberships and its shared folder in one
    /// transaction. Nothing is written when it fails: `Conflict` if the
    /// family id exists, `AlreadyMember` if a user is listed twice.
    async fn create_family(&self, seed: &FamilySeed) -> Result<(), StoreError>;

    /// Fails with `FamilyNotFound` or `AlreadyMember`.
    async fn add_member(&self, member: &FamilyMember) -> Result<(), StoreError>;

    /// Fails with `NotAMember`. Deletes the family and its shared folder when
    /// the last member leaves; shared notes and events of a deleted family
    /// fall back to their owners' private scope.
    async fn remove_member(&self, family_id: Uuid, user_id: Uuid) -> Result<Removal, StoreError>;

    async fn is_member(&self, family_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Ordered by `joined_at`, oldest first.
    async fn families_of(&self, user_id: Uuid) -> Result<Vec<FamilyMembership>, StoreError>;

    /// Ordered by `joined_at`, oldest first.
    async fn members_of(&self, family_id: Uuid) -> Result<Vec<MemberEntry>, StoreError>;

    // Folders
    async fn insert_folder(&self, folder: &Folder) -> Result<(), StoreError>;
    async fn find_folder(&self, id: Uuid) -> Result<Option<Folder>, StoreError>;
    /// Own personal folders plus the shared folders of the user's families.
    async fn folders_of(&self, user_id: Uuid) -> Result<Vec<Folder>, StoreError>;

    /// Notes in the folder keep existing with no folder.
    async fn delete_folder(&self, id: Uuid) -> Result<bool, StoreError>;

    // Notes
    async fn insert_note(&self, note: &Note) -> Result<(), StoreError>;
    async fn find_note(&self, id: Uuid) -> Result<Option<Note>, StoreError>;

    /// Ordered by `updated_at`, newest first.
    async fn select_notes(&self, query: &NoteQuery) -> Result<Vec<Note>, StoreError>;
    async fn update_note(&self, note: &Note) -> Result<(), StoreError>;
    async fn set_note_deleted(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<bool, StoreError>;

    // Collaborators
    async fn upsert_collaborator(&self, collaborator: &Collaborator) -> Result<(), StoreError>;
    async fn delete_collaborator(&self, note_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
    async fn find_collaborator(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Collaborator>, StoreError>;
    async fn collaborators_of(&self, note_id: Uuid) -> Result<Vec<Collaborator>, StoreError>;

    // Events
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError>;
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Ordered by `date`, earliest first.
    async fn select_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError>;
    async fn update_event(&self, event: &Event) -> Result<(), StoreError>;
    async fn set_event_deleted(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<bool, StoreError>;

    // Comments and attachments
    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError>;

    /// Ordered by `created_at`, oldest first.
    async fn comments_of(&self, note_id: Uuid) -> Result<Vec<Comment>, StoreError>;
    async fn insert_attachment(&self, attachment: &Attachment) -> Result<(), StoreError>;
    async fn find_attachment(&self, id: Uuid) -> Result<Option<Attachment>, StoreError>;
    async fn attachments_of(&self, note_id: Uuid) -> Result<Vec<Attachment>, StoreError>;
}
