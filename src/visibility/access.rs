use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::database::models::{Note, Permission};

/// What an actor may do with a note they can see. Ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoteAccess {
    Read,
    /// Title and content only
    Edit,
    Owner,
}

/// Combines the three channels into one effective access level.
///
/// Write collaborators, and family members of a public note whose
/// `public_permission` is `write`, get content edits. Other collaborators and
/// family members read.
pub fn resolve_note_access(
    note: &Note,
    actor: Uuid,
    grant: Option<Permission>,
    family_member: bool,
) -> Option<NoteAccess> {
    if note.user_id == actor {
        return Some(NoteAccess::Owner);
    }

    let via_grant = grant.map(|permission| match permission {
        Permission::Write => NoteAccess::Edit,
        Permission::Read => NoteAccess::Read,
    });

    let via_family = family_member.then(|| {
        if note.is_public && note.public_permission == Permission::Write {
            NoteAccess::Edit
        } else {
            NoteAccess::Read
        }
    });

    via_grant.max(via_family)
}

impl NoteAccess {
    /// Checks `patch` against the field whitelist for this access level.
    /// On refusal returns the fields that are not allowed.
    pub fn authorize(&self, patch: &NotePatch) -> Result<(), Vec<&'static str>> {
        let refused = match self {
            NoteAccess::Owner => vec![],
            NoteAccess::Edit => patch.owner_only_fields(),
            NoteAccess::Read => patch.touched_fields(),
        };

        if refused.is_empty() {
            Ok(())
        } else {
            Err(refused)
        }
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, NoteAccess::Owner)
    }
}

/// Partial update of a note. Absent fields are left unchanged; for the
/// nullable `folder_id` and `family_id`, an explicit `null` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub folder_id: Option<Option<Uuid>>,
    pub is_public: Option<bool>,
    pub public_permission: Option<Permission>,
    #[serde(default, deserialize_with = "double_option")]
    pub family_id: Option<Option<Uuid>>,
}

impl NotePatch {
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = vec![];
        if self.title.is_some() {
            fields.push("title");
        }
        if self.content.is_some() {
            fields.push("content");
        }
        fields.extend(self.owner_only_fields());
        fields
    }

    pub fn owner_only_fields(&self) -> Vec<&'static str> {
        let mut fields = vec![];
        if self.folder_id.is_some() {
            fields.push("folder_id");
        }
        if self.is_public.is_some() {
            fields.push("is_public");
        }
        if self.public_permission.is_some() {
            fields.push("public_permission");
        }
        if self.family_id.is_some() {
            fields.push("family_id");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }

    pub fn apply(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(folder_id) = self.folder_id {
            note.folder_id = folder_id;
        }
        if let Some(is_public) = self.is_public {
            note.is_public = is_public;
        }
        if let Some(permission) = self.public_permission {
            note.public_permission = permission;
        }
        if let Some(family_id) = self.family_id {
            note.family_id = family_id;
        }
    }
}

pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note(owner: Uuid) -> Note {
        let now = Utc::now();
        Note {
            id: Uuid::new_v4(),
            user_id: owner,
            family_id: Some(Uuid::new_v4()),
            folder_id: None,
            title: "t".into(),
            content: "c".into(),
            is_public: false,
            public_permission: Permission::Read,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn owner_wins_over_everything() {
        let owner = Uuid::new_v4();
        assert_eq!(resolve_note_access(&note(owner), owner, None, false), Some(NoteAccess::Owner));
    }

    #[test]
    fn strangers_see_nothing() {
        assert_eq!(resolve_note_access(&note(Uuid::new_v4()), Uuid::new_v4(), None, false), None);
    }

    #[test]
    fn family_members_read_unless_note_is_public_write() {
        let mut shared = note(Uuid::new_v4());
        let member = Uuid::new_v4();
        assert_eq!(resolve_note_access(&shared, member, None, true), Some(NoteAccess::Read));

        shared.is_public = true;
        assert_eq!(resolve_note_access(&shared, member, None, true), Some(NoteAccess::Read));

        shared.public_permission = Permission::Write;
        assert_eq!(resolve_note_access(&shared, member, None, true), Some(NoteAccess::Edit));
    }

    #[test]
    fn strongest_channel_is_used() {
        let shared = note(Uuid::new_v4());
        let actor = Uuid::new_v4();
        assert_eq!(
            resolve_note_access(&shared, actor, Some(Permission::Write), true),
            Some(NoteAccess::Edit)
        );
        assert_eq!(
            resolve_note_access(&shared, actor, Some(Permission::Read), false),
            Some(NoteAccess::Read)
        );
    }

    #[test]
    fn editors_may_only_touch_content_fields() {
        let content_only = NotePatch {
            title: Some("new".into()),
            content: Some("body".into()),
            ..Default::default()
        };
        assert_eq!(NoteAccess::Edit.authorize(&content_only), Ok(()));

        let rescope = NotePatch {
            content: Some("body".into()),
            family_id: Some(None),
            ..Default::default()
        };
        assert_eq!(NoteAccess::Edit.authorize(&rescope), Err(vec!["family_id"]));
        assert_eq!(NoteAccess::Owner.authorize(&rescope), Ok(()));
        assert_eq!(NoteAccess::Read.authorize(&rescope), Err(vec!["content", "family_id"]));
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let absent: NotePatch = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.family_id, None);

        let cleared: NotePatch = serde_json::from_str(r#"{"family_id":null}"#).unwrap();
        assert_eq!(cleared.family_id, Some(None));

        let mut n = note(Uuid::new_v4());
        cleared.apply(&mut n);
        assert_eq!(n.family_id, None);
    }
}
