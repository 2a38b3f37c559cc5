use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::{Family, FamilyMember, FamilyMembership, FamilyRole, Folder, MemberEntry};
use crate::database::{FamilySeed, Removal, Store};
use crate::visibility::VisibilityResolver;

use super::{validate_name, CoreError};

const MAX_FAMILY_NAME: usize = 100;

/// A new family and the shared folder created with it
#[derive(Debug, Clone, Serialize)]
pub struct CreatedFamily {
    #[serde(flatten)]
    pub family: Family,
    pub shared_folder: Folder,
}

/// Create, join and leave families
#[derive(Clone)]
pub struct FamilyService {
    store: Arc<dyn Store>,
    resolver: VisibilityResolver,
    clock: Arc<dyn Clock>,
}

impl FamilyService {
    pub fn new(store: Arc<dyn Store>, resolver: VisibilityResolver, clock: Arc<dyn Clock>) -> Self {
        Self { store, resolver, clock }
    }

    /// Creates the family with `actor` as its owner, plus its shared folder.
    pub async fn create(&self, actor: Uuid, name: &str) -> Result<CreatedFamily, CoreError> {
        let name = validate_name("Family name", name, MAX_FAMILY_NAME)?;
        let now = self.clock.now();

        let family = Family {
            id: Uuid::new_v4(),
            name,
            creator_id: actor,
            created_at: now,
        };
        let owner = FamilyMember {
            family_id: family.id,
            user_id: actor,
            role: FamilyRole::Owner,
            joined_at: now,
        };

        let seed = FamilySeed::new(family, vec![owner]);
        self.store.create_family(&seed).await?;
        info!("User {} created family {} ({})", actor, seed.family.id, seed.family.name);
        Ok(CreatedFamily {
            family: seed.family,
            shared_folder: seed.shared_folder,
        })
    }

    pub async fn join(&self, actor: Uuid, family_id: Uuid) -> Result<FamilyMember, CoreError> {
        let member = FamilyMember {
            family_id,
            user_id: actor,
            role: FamilyRole::Member,
            joined_at: self.clock.now(),
        };

        self.store.add_member(&member).await?;
        info!("User {} joined family {}", actor, family_id);
        Ok(member)
    }

    /// Removes `actor` from the family; the last member out deletes it.
    pub async fn leave(&self, actor: Uuid, family_id: Uuid) -> Result<Removal, CoreError> {
        let removal = self.store.remove_member(family_id, actor).await?;

        if removal.family_deleted {
            info!("Family {} deleted after its last member {} left", family_id, actor);
        } else if removal.role == FamilyRole::Owner {
            warn!(
                "Owner {} left family {}; {} remaining member(s) have no owner",
                actor, family_id, removal.remaining_members
            );
        } else {
            info!("User {} left family {}", actor, family_id);
        }

        Ok(removal)
    }

    pub async fn my_families(&self, actor: Uuid) -> Result<Vec<FamilyMembership>, CoreError> {
        Ok(self.store.families_of(actor).await?)
    }

    pub async fn members(&self, actor: Uuid, family_id: Uuid) -> Result<Vec<MemberEntry>, CoreError> {
        self.resolver.require_member(actor, family_id).await?;
        Ok(self.store.members_of(family_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::database::models::User;
    use crate::database::MemoryStore;

    fn service_with_store() -> (FamilyService, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = FamilyService::new(store.clone(), VisibilityResolver::new(store.clone()), Arc::new(SystemClock));
        (service, store)
    }

    fn service() -> FamilyService {
        service_with_store().0
    }

    async fn user(store: &Arc<dyn Store>, username: &str) -> Uuid {
        let now = chrono::Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: "x".to_string(),
            avatar_color: "#000000".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.insert_user(&user).await.unwrap();
        user.id
    }

    #[tokio::test]
    async fn creator_becomes_owner() {
        let families = service();
        let a = Uuid::new_v4();

        let created = families.create(a, " Smiths ").await.unwrap();
        assert_eq!(created.family.name, "Smiths");
        assert_eq!(created.shared_folder.family_id, Some(created.family.id));

        let mine = families.my_families(a).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].role, FamilyRole::Owner);
        assert_eq!(mine[0].family.id, created.family.id);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let err = service().create(Uuid::new_v4(), "  ").await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn join_twice_is_already_member() {
        let families = service();
        let family = families.create(Uuid::new_v4(), "Smiths").await.unwrap().family;
        let b = Uuid::new_v4();

        families.join(b, family.id).await.unwrap();
        assert!(matches!(families.join(b, family.id).await, Err(CoreError::AlreadyMember)));
    }

    #[tokio::test]
    async fn owner_leaving_leaves_family_ownerless() {
        let (families, store) = service_with_store();
        let a = user(&store, "alice").await;
        let b = user(&store, "bob").await;
        let family = families.create(a, "Smiths").await.unwrap().family;
        families.join(b, family.id).await.unwrap();

        let removal = families.leave(a, family.id).await.unwrap();
        assert_eq!(removal.role, FamilyRole::Owner);
        assert!(!removal.family_deleted);

        let members = families.members(b, family.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user.id, b);
        assert_eq!(members[0].role, FamilyRole::Member);
    }

    #[tokio::test]
    async fn members_requires_membership() {
        let families = service();
        let family = families.create(Uuid::new_v4(), "Smiths").await.unwrap().family;

        let err = families.members(Uuid::new_v4(), family.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }
}
