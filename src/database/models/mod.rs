pub mod event;
pub mod extra;
pub mod family;
pub mod folder;
pub mod note;
pub mod user;

pub use event::{Event, EventType, Recurrence};
pub use extra::{Attachment, Comment};
pub use family::{Family, FamilyMember, FamilyMembership, FamilyRole, MemberEntry};
pub use folder::Folder;
pub use note::{Collaborator, Note, Permission};
pub use user::{User, UserSummary};

/// Error for a text column holding a value outside its enumeration
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
