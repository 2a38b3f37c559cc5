use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{UnknownVariant, UserSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Role is fixed when the membership row is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    Owner,
    Member,
}

impl FamilyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyRole::Owner => "owner",
            FamilyRole::Member => "member",
        }
    }
}

impl TryFrom<String> for FamilyRole {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "owner" => Ok(FamilyRole::Owner),
            "member" => Ok(FamilyRole::Member),
            _ => Err(UnknownVariant { kind: "family role", value }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct FamilyMember {
    pub family_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub role: FamilyRole,
    pub joined_at: DateTime<Utc>,
}

/// One row of "families I belong to"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyMembership {
    pub family: Family,
    pub role: FamilyRole,
    pub joined_at: DateTime<Utc>,
}

/// One row of "who belongs to this family"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberEntry {
    pub user: UserSummary,
    pub role: FamilyRole,
    pub joined_at: DateTime<Utc>,
}
