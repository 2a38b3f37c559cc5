use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::Family;

const SHARED_FOLDER_ICON: &str = "🏠";

/// A personal folder, or a family's shared folder when `family_id` is set.
/// Shared folders belong to the family: every member sees them and they
/// go away with the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Folder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Option<Uuid>,
    pub name: String,
    pub icon: String,
    pub created_at: DateTime<Utc>,
}

impl Folder {
    /// The folder created alongside `family`, credited to its creator.
    pub fn shared_for(family: &Family) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: family.creator_id,
            family_id: Some(family.id),
            name: format!("{} (shared)", family.name),
            icon: SHARED_FOLDER_ICON.to_string(),
            created_at: family.created_at,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.family_id.is_some()
    }
}
