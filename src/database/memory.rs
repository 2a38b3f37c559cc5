use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{
    Attachment, Collaborator, Comment, Event, Family, FamilyMember, FamilyMembership, Folder, MemberEntry, Note,
    User, UserSummary,
};
use crate::database::store::{EventQuery, FamilySeed, NoteQuery, Removal, Store, StoreError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    families: HashMap<Uuid, Family>,
    // (family_id, user_id)
    members: BTreeMap<(Uuid, Uuid), FamilyMember>,
    folders: HashMap<Uuid, Folder>,
    notes: HashMap<Uuid, Note>,
    // (note_id, user_id)
    collaborators: BTreeMap<(Uuid, Uuid), Collaborator>,
    events: HashMap<Uuid, Event>,
    comments: Vec<Comment>,
    attachments: Vec<Attachment>,
}

/// Process-local [`Store`]. One write lock per operation makes every
/// compound write atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("username '{}' is taken", user.username)));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<User>, StoreError> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t
            .users
            .values()
            .filter(|u| contains_ignore_case(&u.username, query))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users.truncate(limit.max(0) as usize);
        Ok(users)
    }

    async fn find_family(&self, id: Uuid) -> Result<Option<Family>, StoreError> {
        Ok(self.tables.read().await.families.get(&id).cloned())
    }

    async fn create_family(&self, seed: &FamilySeed) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.families.contains_key(&seed.family.id) {
            return Err(StoreError::Conflict(format!("family {} already exists", seed.family.id)));
        }
        let mut seen = HashSet::new();
        if !seed.members.iter().all(|m| seen.insert(m.user_id)) {
            return Err(StoreError::AlreadyMember);
        }

        t.families.insert(seed.family.id, seed.family.clone());
        for member in &seed.members {
            t.members.insert((seed.family.id, member.user_id), member.clone());
        }
        t.folders.insert(seed.shared_folder.id, seed.shared_folder.clone());
        Ok(())
    }

    async fn add_member(&self, member: &FamilyMember) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if !t.families.contains_key(&member.family_id) {
            return Err(StoreError::FamilyNotFound);
        }
        let key = (member.family_id, member.user_id);
        if t.members.contains_key(&key) {
            return Err(StoreError::AlreadyMember);
        }
        t.members.insert(key, member.clone());
        Ok(())
    }

    async fn remove_member(&self, family_id: Uuid, user_id: Uuid) -> Result<Removal, StoreError> {
        let mut t = self.tables.write().await;
        let removed = t
            .members
            .remove(&(family_id, user_id))
            .ok_or(StoreError::NotAMember)?;

        let remaining_members = t.members.keys().filter(|(f, _)| *f == family_id).count() as i64;
        let family_deleted = remaining_members == 0;
        if family_deleted {
            t.families.remove(&family_id);
            let shared: Vec<Uuid> = t
                .folders
                .values()
                .filter(|f| f.family_id == Some(family_id))
                .map(|f| f.id)
                .collect();
            t.folders.retain(|_, f| f.family_id != Some(family_id));
            for note in t.notes.values_mut() {
                if note.family_id == Some(family_id) {
                    note.family_id = None;
                }
                if note.folder_id.map_or(false, |id| shared.contains(&id)) {
                    note.folder_id = None;
                }
            }
            for event in t.events.values_mut().filter(|e| e.family_id == Some(family_id)) {
                event.family_id = None;
            }
        }

        Ok(Removal {
            role: removed.role,
            remaining_members,
            family_deleted,
        })
    }

    async fn is_member(&self, family_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.members.contains_key(&(family_id, user_id)))
    }

    async fn families_of(&self, user_id: Uuid) -> Result<Vec<FamilyMembership>, StoreError> {
        let t = self.tables.read().await;
        let mut memberships: Vec<FamilyMembership> = t
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                t.families.get(&m.family_id).map(|family| FamilyMembership {
                    family: family.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        memberships.sort_by_key(|m| m.joined_at);
        Ok(memberships)
    }

    async fn members_of(&self, family_id: Uuid) -> Result<Vec<MemberEntry>, StoreError> {
        let t = self.tables.read().await;
        let mut entries: Vec<MemberEntry> = t
            .members
            .values()
            .filter(|m| m.family_id == family_id)
            .filter_map(|m| {
                t.users.get(&m.user_id).map(|user| MemberEntry {
                    user: UserSummary::from(user),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        entries.sort_by_key(|e| e.joined_at);
        Ok(entries)
    }

    async fn insert_folder(&self, folder: &Folder) -> Result<(), StoreError> {
        self.tables.write().await.folders.insert(folder.id, folder.clone());
        Ok(())
    }

    async fn find_folder(&self, id: Uuid) -> Result<Option<Folder>, StoreError> {
        Ok(self.tables.read().await.folders.get(&id).cloned())
    }

    async fn folders_of(&self, user_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        let t = self.tables.read().await;
        let mut folders: Vec<Folder> = t
            .folders
            .values()
            .filter(|f| match f.family_id {
                Some(family_id) => t.members.contains_key(&(family_id, user_id)),
                None => f.user_id == user_id,
            })
            .cloned()
            .collect();
        folders.sort_by_key(|f| f.created_at);
        Ok(folders)
    }

    async fn delete_folder(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut t = self.tables.write().await;
        if t.folders.remove(&id).is_none() {
            return Ok(false);
        }
        for note in t.notes.values_mut().filter(|n| n.folder_id == Some(id)) {
            note.folder_id = None;
        }
        Ok(true)
    }

    async fn insert_note(&self, note: &Note) -> Result<(), StoreError> {
        self.tables.write().await.notes.insert(note.id, note.clone());
        Ok(())
    }

    async fn find_note(&self, id: Uuid) -> Result<Option<Note>, StoreError> {
        Ok(self.tables.read().await.notes.get(&id).cloned())
    }

    async fn select_notes(&self, query: &NoteQuery) -> Result<Vec<Note>, StoreError> {
        let t = self.tables.read().await;
        let mut notes: Vec<Note> = t
            .notes
            .values()
            .filter(|n| n.deleted_at.is_none())
            .filter(|n| {
                query
                    .visibility
                    .admits(*n, |user_id| t.collaborators.contains_key(&(n.id, user_id)))
            })
            .filter(|n| query.folder_id.map_or(true, |folder_id| n.folder_id == Some(folder_id)))
            .filter(|n| {
                query.search.as_deref().map_or(true, |s| {
                    contains_ignore_case(&n.title, s) || contains_ignore_case(&n.content, s)
                })
            })
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = query.limit {
            notes.truncate(limit.max(0) as usize);
        }
        Ok(notes)
    }

    async fn update_note(&self, note: &Note) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        match t.notes.get_mut(&note.id) {
            Some(existing) => {
                *existing = note.clone();
                Ok(())
            }
            None => Err(StoreError::QueryError(format!("note {} does not exist", note.id))),
        }
    }

    async fn set_note_deleted(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<bool, StoreError> {
        let mut t = self.tables.write().await;
        Ok(t.notes.get_mut(&id).map(|n| n.deleted_at = deleted_at).is_some())
    }

    async fn upsert_collaborator(&self, collaborator: &Collaborator) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .collaborators
            .insert((collaborator.note_id, collaborator.user_id), collaborator.clone());
        Ok(())
    }

    async fn delete_collaborator(&self, note_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.collaborators.remove(&(note_id, user_id)).is_some())
    }

    async fn find_collaborator(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Collaborator>, StoreError> {
        Ok(self.tables.read().await.collaborators.get(&(note_id, user_id)).cloned())
    }

    async fn collaborators_of(&self, note_id: Uuid) -> Result<Vec<Collaborator>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.collaborators
            .values()
            .filter(|c| c.note_id == note_id)
            .cloned()
            .collect())
    }

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        self.tables.write().await.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn select_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        let t = self.tables.read().await;
        let mut events: Vec<Event> = t
            .events
            .values()
            .filter(|e| e.deleted_at.is_none())
            .filter(|e| query.visibility.admits(*e, |_| false))
            .filter(|e| query.range.map_or(true, |(start, end)| e.date >= start && e.date <= end))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn update_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        match t.events.get_mut(&event.id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(())
            }
            None => Err(StoreError::QueryError(format!("event {} does not exist", event.id))),
        }
    }

    async fn set_event_deleted(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<bool, StoreError> {
        let mut t = self.tables.write().await;
        Ok(t.events.get_mut(&id).map(|e| e.deleted_at = deleted_at).is_some())
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.tables.write().await.comments.push(comment.clone());
        Ok(())
    }

    async fn comments_of(&self, note_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let t = self.tables.read().await;
        let mut comments: Vec<Comment> = t.comments.iter().filter(|c| c.note_id == note_id).cloned().collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn insert_attachment(&self, attachment: &Attachment) -> Result<(), StoreError> {
        self.tables.write().await.attachments.push(attachment.clone());
        Ok(())
    }

    async fn find_attachment(&self, id: Uuid) -> Result<Option<Attachment>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.attachments.iter().find(|a| a.id == id).cloned())
    }

    async fn attachments_of(&self, note_id: Uuid) -> Result<Vec<Attachment>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.attachments.iter().filter(|a| a.note_id == note_id).cloned().collect())
    }
}
