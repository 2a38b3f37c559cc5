//! Visibility resolution for notes and events.
//!
//! Every listing is filtered by a [`Visibility`]: a union of independent
//! branches, each admitting rows through one channel:
//!
//! - `OwnedPrivate(u)`: rows owned by `u` that are not shared to a family
//! - `Family(f)`: rows shared to family `f`
//! - `Collaborator(u)`: notes carrying an explicit grant for `u`
//! - `System`: system events
//!
//! Branches are only ever OR-ed together. A family branch is only handed
//! out by [`VisibilityResolver::family_scope`] after a membership check.

pub mod access;
pub mod sql;

use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::database::models::{Event, Note};
use crate::database::store::Store;
use crate::services::CoreError;

pub use access::{NoteAccess, NotePatch};
pub use sql::SqlPredicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Note,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    OwnedPrivate(Uuid),
    Family(Uuid),
    Collaborator(Uuid),
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    kind: ResourceKind,
    branches: Vec<Branch>,
}

impl Visibility {
    /// Personal scope: own unshared rows, plus collaborator grants for notes
    /// or system rows for events.
    pub fn personal(actor: Uuid, kind: ResourceKind) -> Self {
        let extra = match kind {
            ResourceKind::Note => Branch::Collaborator(actor),
            ResourceKind::Event => Branch::System,
        };
        Self {
            kind,
            branches: vec![Branch::OwnedPrivate(actor), extra],
        }
    }

    pub(crate) fn family(family_id: Uuid, kind: ResourceKind) -> Self {
        Self {
            kind,
            branches: vec![Branch::Family(family_id)],
        }
    }

    /// System events only
    pub(crate) fn system_events() -> Self {
        Self {
            kind: ResourceKind::Event,
            branches: vec![Branch::System],
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// In-process evaluation of the predicate. `has_grant(user)` reports
    /// whether `row` carries a collaborator grant for `user`.
    pub fn admits<R: Scoped>(&self, row: &R, has_grant: impl Fn(Uuid) -> bool) -> bool {
        self.branches.iter().any(|branch| match *branch {
            Branch::OwnedPrivate(actor) => row.owner_id() == Some(actor) && row.family_id().is_none(),
            Branch::Family(family_id) => row.family_id() == Some(family_id),
            Branch::Collaborator(actor) => self.kind == ResourceKind::Note && has_grant(actor),
            Branch::System => self.kind == ResourceKind::Event && row.is_system(),
        })
    }
}

/// Ownership shape shared by notes and events
pub trait Scoped {
    fn owner_id(&self) -> Option<Uuid>;
    fn family_id(&self) -> Option<Uuid>;
    fn is_system(&self) -> bool {
        false
    }
}

impl Scoped for Note {
    fn owner_id(&self) -> Option<Uuid> {
        Some(self.user_id)
    }

    fn family_id(&self) -> Option<Uuid> {
        self.family_id
    }
}

impl Scoped for Event {
    fn owner_id(&self) -> Option<Uuid> {
        self.user_id
    }

    fn family_id(&self) -> Option<Uuid> {
        self.family_id
    }

    fn is_system(&self) -> bool {
        self.is_system
    }
}

/// Decides, per request, what an actor may see and change
#[derive(Clone)]
pub struct VisibilityResolver {
    store: Arc<dyn Store>,
}

impl VisibilityResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn personal_scope(&self, actor: Uuid, kind: ResourceKind) -> Visibility {
        Visibility::personal(actor, kind)
    }

    /// Family scope for `actor`. Non-members get `Forbidden` whether or not
    /// the family exists.
    pub async fn family_scope(
        &self,
        actor: Uuid,
        family_id: Uuid,
        kind: ResourceKind,
    ) -> Result<Visibility, CoreError> {
        self.require_member(actor, family_id).await?;
        Ok(Visibility::family(family_id, kind))
    }

    pub async fn require_member(&self, actor: Uuid, family_id: Uuid) -> Result<(), CoreError> {
        if self.store.is_member(family_id, actor).await? {
            Ok(())
        } else {
            warn!("User {} denied access to family {}", actor, family_id);
            Err(CoreError::Forbidden("not a member of this family".to_string()))
        }
    }

    /// Effective access of `actor` to a live note, or `None` if the note is
    /// invisible to them.
    pub async fn note_access(&self, actor: Uuid, note: &Note) -> Result<Option<NoteAccess>, CoreError> {
        if note.user_id == actor {
            return Ok(Some(NoteAccess::Owner));
        }

        let grant = self
            .store
            .find_collaborator(note.id, actor)
            .await?
            .map(|c| c.permission);

        let family_member = match note.family_id {
            Some(family_id) => self.store.is_member(family_id, actor).await?,
            None => false,
        };

        Ok(access::resolve_note_access(note, actor, grant, family_member))
    }

    /// Whether `actor` may read `event` at all.
    pub async fn can_view_event(&self, actor: Uuid, event: &Event) -> Result<bool, CoreError> {
        if event.is_system || event.user_id == Some(actor) {
            return Ok(true);
        }
        match event.family_id {
            Some(family_id) => Ok(self.store.is_member(family_id, actor).await?),
            None => Ok(false),
        }
    }

    /// Events are written by their owner only; system events by nobody.
    pub fn authorize_event_write(&self, actor: Uuid, event: &Event) -> Result<(), CoreError> {
        if event.is_system {
            return Err(CoreError::Forbidden("system events are read-only".to_string()));
        }
        if event.user_id != Some(actor) {
            return Err(CoreError::Forbidden("only the owner may change this event".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{EventType, Permission, Recurrence};
    use chrono::Utc;

    fn note(owner: Uuid, family_id: Option<Uuid>) -> Note {
        let now = Utc::now();
        Note {
            id: Uuid::new_v4(),
            user_id: owner,
            family_id,
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

    fn event(owner: Option<Uuid>, family_id: Option<Uuid>, is_system: bool) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            user_id: owner,
            family_id,
            title: "e".into(),
            description: String::new(),
            date: now,
            event_type: EventType::Solar,
            recurrence: Recurrence::None,
            notify_users: vec![],
            show_countdown: false,
            is_system,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn personal_notes_exclude_own_family_shared_notes() {
        let me = Uuid::new_v4();
        let scope = Visibility::personal(me, ResourceKind::Note);

        assert!(scope.admits(&note(me, None), |_| false));
        assert!(!scope.admits(&note(me, Some(Uuid::new_v4())), |_| false));
    }

    #[test]
    fn personal_notes_include_collaborator_grants() {
        let me = Uuid::new_v4();
        let other = note(Uuid::new_v4(), None);
        let scope = Visibility::personal(me, ResourceKind::Note);

        assert!(!scope.admits(&other, |_| false));
        assert!(scope.admits(&other, |user| user == me));
    }

    #[test]
    fn collaborator_branch_does_not_apply_to_events() {
        let me = Uuid::new_v4();
        let scope = Visibility::personal(me, ResourceKind::Event);
        assert!(!scope.admits(&event(Some(Uuid::new_v4()), None, false), |_| true));
    }

    #[test]
    fn personal_events_include_system_events() {
        let me = Uuid::new_v4();
        let scope = Visibility::personal(me, ResourceKind::Event);

        assert!(scope.admits(&event(None, None, true), |_| false));
        assert!(scope.admits(&event(Some(me), None, false), |_| false));
        assert!(!scope.admits(&event(Some(Uuid::new_v4()), None, false), |_| false));
    }

    #[test]
    fn system_branch_does_not_apply_to_notes() {
        let scope = Visibility::personal(Uuid::new_v4(), ResourceKind::Note);
        assert!(!scope.branches().contains(&Branch::System));
    }

    #[test]
    fn family_scope_matches_only_that_family() {
        let family_id = Uuid::new_v4();
        let scope = Visibility::family(family_id, ResourceKind::Note);

        assert!(scope.admits(&note(Uuid::new_v4(), Some(family_id)), |_| false));
        assert!(!scope.admits(&note(Uuid::new_v4(), Some(Uuid::new_v4())), |_| false));
        assert!(!scope.admits(&note(Uuid::new_v4(), None), |_| true));
    }
}
