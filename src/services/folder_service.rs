use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::Folder;
use crate::database::Store;

use super::{validate_name, CoreError};

const DEFAULT_ICON: &str = "folder";

#[derive(Debug, Clone, Deserialize)]
pub struct NewFolder {
    pub name: String,
    pub icon: Option<String>,
}

/// Personal folders belong to one user; a family's shared folder is listed
/// for every member and lives exactly as long as the family.
#[derive(Clone)]
pub struct FolderService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl FolderService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self, actor: Uuid) -> Result<Vec<Folder>, CoreError> {
        Ok(self.store.folders_of(actor).await?)
    }

    pub async fn create(&self, actor: Uuid, new: NewFolder) -> Result<Folder, CoreError> {
        let folder = Folder {
            id: Uuid::new_v4(),
            user_id: actor,
            family_id: None,
            name: validate_name("Folder name", &new.name, 100)?,
            icon: new
                .icon
                .map(|icon| icon.trim().to_string())
                .filter(|icon| !icon.is_empty())
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            created_at: self.clock.now(),
        };
        self.store.insert_folder(&folder).await?;
        Ok(folder)
    }

    /// Notes filed in the folder stay, unfiled. Shared folders cannot be
    /// deleted on their own.
    pub async fn delete(&self, actor: Uuid, folder_id: Uuid) -> Result<(), CoreError> {
        let not_found = || CoreError::NotFound("Folder not found".to_string());
        let folder = self.store.find_folder(folder_id).await?.ok_or_else(not_found)?;

        if let Some(family_id) = folder.family_id {
            if self.store.is_member(family_id, actor).await? {
                return Err(CoreError::Forbidden(
                    "Shared folders are removed with their family".to_string(),
                ));
            }
            return Err(not_found());
        }
        if folder.user_id != actor {
            return Err(not_found());
        }

        self.store.delete_folder(folder.id).await?;
        Ok(())
    }
}
