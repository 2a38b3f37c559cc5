use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::{Collaborator, Note, Permission};
use crate::database::{NoteQuery, Store};
use crate::visibility::{NoteAccess, NotePatch, ResourceKind, VisibilityResolver};

use super::CoreError;

const MAX_TITLE: usize = 200;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNote {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub folder_id: Option<Uuid>,
    pub family_id: Option<Uuid>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub public_permission: Permission,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteFilter {
    pub folder_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Note reads and writes, always filtered through the visibility resolver
#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn Store>,
    resolver: VisibilityResolver,
    clock: Arc<dyn Clock>,
    undelete_window: Duration,
    search_limit: i64,
}

impl NoteService {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: VisibilityResolver,
        clock: Arc<dyn Clock>,
        undelete_window: Duration,
        search_limit: i64,
    ) -> Self {
        Self {
            store,
            resolver,
            clock,
            undelete_window,
            search_limit,
        }
    }

    /// Personal scope: own unshared notes plus notes shared with `actor`
    /// as a collaborator. Searches are capped at the configured limit.
    pub async fn list_visible(&self, actor: Uuid, filter: &NoteFilter) -> Result<Vec<Note>, CoreError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        let limit = search.as_ref().map(|_| self.search_limit);

        let query = NoteQuery {
            visibility: self.resolver.personal_scope(actor, ResourceKind::Note),
            folder_id: filter.folder_id,
            search,
            limit,
        };
        Ok(self.store.select_notes(&query).await?)
    }

    pub async fn list_family(&self, actor: Uuid, family_id: Uuid) -> Result<Vec<Note>, CoreError> {
        let query = NoteQuery {
            visibility: self.resolver.family_scope(actor, family_id, ResourceKind::Note).await?,
            folder_id: None,
            search: None,
            limit: None,
        };
        Ok(self.store.select_notes(&query).await?)
    }

    pub async fn get(&self, actor: Uuid, note_id: Uuid) -> Result<Note, CoreError> {
        Ok(self.access(actor, note_id).await?.0)
    }

    /// The live note with `actor`'s access to it. Invisible and deleted
    /// notes are both `NotFound`.
    pub async fn access(&self, actor: Uuid, note_id: Uuid) -> Result<(Note, NoteAccess), CoreError> {
        let note = self
            .store
            .find_note(note_id)
            .await?
            .filter(|note| note.deleted_at.is_none())
            .ok_or_else(not_found)?;

        let access = self.resolver.note_access(actor, &note).await?.ok_or_else(not_found)?;
        Ok((note, access))
    }

    pub async fn create(&self, actor: Uuid, new: NewNote) -> Result<Note, CoreError> {
        check_title(&new.title)?;
        if let Some(family_id) = new.family_id {
            self.resolver.require_member(actor, family_id).await?;
        }
        if let Some(folder_id) = new.folder_id {
            self.check_folder(actor, folder_id).await?;
        }

        let now = self.clock.now();
        let note = Note {
            id: Uuid::new_v4(),
            user_id: actor,
            family_id: new.family_id,
            folder_id: new.folder_id,
            title: new.title,
            content: new.content,
            is_public: new.is_public,
            public_permission: new.public_permission,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.store.insert_note(&note).await?;
        Ok(note)
    }

    /// Applies `patch` if `actor`'s access level allows every field in it.
    pub async fn update(&self, actor: Uuid, note_id: Uuid, patch: NotePatch) -> Result<Note, CoreError> {
        if patch.is_empty() {
            return Err(CoreError::ValidationFailed("No fields to update".to_string()));
        }

        let (mut note, access) = self.access(actor, note_id).await?;
        access.authorize(&patch).map_err(|fields| {
            CoreError::Forbidden(format!("Not allowed to change: {}", fields.join(", ")))
        })?;

        if let Some(title) = &patch.title {
            check_title(title)?;
        }
        if let Some(Some(family_id)) = patch.family_id {
            self.resolver.require_member(actor, family_id).await?;
        }
        if let Some(Some(folder_id)) = patch.folder_id {
            self.check_folder(actor, folder_id).await?;
        }

        patch.apply(&mut note);
        note.updated_at = self.clock.now();
        self.store.update_note(&note).await?;
        Ok(note)
    }

    /// Soft delete. Owner only.
    pub async fn delete(&self, actor: Uuid, note_id: Uuid) -> Result<(), CoreError> {
        let (note, access) = self.access(actor, note_id).await?;
        if !access.can_delete() {
            return Err(CoreError::Forbidden("Only the owner may delete this note".to_string()));
        }

        self.store.set_note_deleted(note.id, Some(self.clock.now())).await?;
        info!("User {} deleted note {}", actor, note.id);
        Ok(())
    }

    /// Brings back a soft-deleted note within the undelete window.
    pub async fn restore(&self, actor: Uuid, note_id: Uuid) -> Result<Note, CoreError> {
        let mut note = self
            .store
            .find_note(note_id)
            .await?
            .filter(|note| note.user_id == actor)
            .ok_or_else(not_found)?;

        let deleted_at = note
            .deleted_at
            .ok_or_else(|| CoreError::ValidationFailed("Note is not deleted".to_string()))?;
        if self.clock.now() - deleted_at > self.undelete_window {
            return Err(not_found());
        }

        self.store.set_note_deleted(note.id, None).await?;
        note.deleted_at = None;
        info!("User {} restored note {}", actor, note.id);
        Ok(note)
    }

    pub async fn collaborators(&self, actor: Uuid, note_id: Uuid) -> Result<Vec<Collaborator>, CoreError> {
        let (note, _) = self.access(actor, note_id).await?;
        Ok(self.store.collaborators_of(note.id).await?)
    }

    /// Grants or changes a collaborator's permission. Owner only.
    pub async fn grant(
        &self,
        actor: Uuid,
        note_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<Collaborator, CoreError> {
        let note = self.owned_note(actor, note_id).await?;
        if user_id == actor {
            return Err(CoreError::ValidationFailed(
                "The owner cannot be added as a collaborator".to_string(),
            ));
        }
        if self.store.find_user(user_id).await?.is_none() {
            return Err(CoreError::NotFound("User not found".to_string()));
        }

        let collaborator = Collaborator {
            note_id: note.id,
            user_id,
            permission,
        };
        self.store.upsert_collaborator(&collaborator).await?;
        info!("User {} granted {} on note {} to {}", actor, permission.as_str(), note.id, user_id);
        Ok(collaborator)
    }

    pub async fn revoke(&self, actor: Uuid, note_id: Uuid, user_id: Uuid) -> Result<(), CoreError> {
        let note = self.owned_note(actor, note_id).await?;
        if !self.store.delete_collaborator(note.id, user_id).await? {
            return Err(CoreError::NotFound("Collaborator not found".to_string()));
        }
        Ok(())
    }

    async fn owned_note(&self, actor: Uuid, note_id: Uuid) -> Result<Note, CoreError> {
        let (note, access) = self.access(actor, note_id).await?;
        if access != NoteAccess::Owner {
            return Err(CoreError::Forbidden(
                "Only the owner may manage collaborators".to_string(),
            ));
        }
        Ok(note)
    }

    /// Own personal folders, or the shared folder of a family the actor is in.
    async fn check_folder(&self, actor: Uuid, folder_id: Uuid) -> Result<(), CoreError> {
        let folder_not_found = || CoreError::NotFound("Folder not found".to_string());
        let folder = self.store.find_folder(folder_id).await?.ok_or_else(folder_not_found)?;

        let usable = match folder.family_id {
            Some(family_id) => self.store.is_member(family_id, actor).await?,
            None => folder.user_id == actor,
        };
        if usable {
            Ok(())
        } else {
            Err(folder_not_found())
        }
    }
}

fn not_found() -> CoreError {
    CoreError::NotFound("Note not found".to_string())
}

fn check_title(title: &str) -> Result<(), CoreError> {
    if title.chars().count() > MAX_TITLE {
        return Err(CoreError::ValidationFailed(format!(
            "Title must be at most {} characters",
            MAX_TITLE
        )));
    }
    Ok(())
}
