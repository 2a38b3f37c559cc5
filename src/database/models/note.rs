use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UnknownVariant;

/// Access level carried by collaborator grants and public notes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            _ => Err(UnknownVariant { kind: "permission", value }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub is_public: bool,
    #[sqlx(try_from = "String")]
    pub public_permission: Permission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Collaborator {
    pub note_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub permission: Permission,
}
