//! One-way conversion of legacy single-family-per-user data into
//! membership rows.
//!
//! Older data carried at most one free-form family code on each user.
//! Users sharing a code become one family. The earliest-created user in a
//! group is its creator and owner; everyone else joins as a member.
//!
//! Family ids are derived from the code, so running the backfill again
//! skips every family it already wrote. Notes and events are not touched:
//! legacy records never referenced a family.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{Family, FamilyMember, FamilyRole};
use crate::database::{FamilySeed, Store, StoreError};

use super::CoreError;

const LEGACY_FAMILY_NAMESPACE: &str = "family-notes:legacy-family:";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyUser {
    pub user_id: Uuid,
    pub family_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFamily {
    pub family: Family,
    /// Owner first, then members by creation time
    pub members: Vec<FamilyMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillPlan {
    pub families: Vec<PlannedFamily>,
}

impl BackfillPlan {
    pub fn member_count(&self) -> usize {
        self.families.iter().map(|f| f.members.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub created: usize,
    /// Families already present from an earlier run
    pub skipped: usize,
    pub memberships: usize,
}

/// Stable family id for a (trimmed) legacy code
pub fn legacy_family_id(code: &str) -> Uuid {
    let name = format!("{}{}", LEGACY_FAMILY_NAMESPACE, code.trim());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

fn legacy_code(user: &LegacyUser) -> Option<&str> {
    user.family_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

/// Pure planning step. Users without a code, or with a blank one, stay
/// family-less. A user listed more than once keeps only their earliest row
/// that carries a code. Ties on `created_at` are broken by user id so the
/// plan is deterministic.
pub fn plan_legacy_backfill(users: &[LegacyUser]) -> BackfillPlan {
    let mut earliest: BTreeMap<Uuid, (&LegacyUser, &str)> = BTreeMap::new();
    for user in users {
        let code = match legacy_code(user) {
            Some(code) => code,
            None => continue,
        };
        match earliest.entry(user.user_id) {
            Entry::Vacant(slot) => {
                slot.insert((user, code));
            }
            Entry::Occupied(mut slot) => {
                let (kept, kept_code) = *slot.get();
                if (user.created_at, code) < (kept.created_at, kept_code) {
                    slot.insert((user, code));
                }
            }
        }
    }

    let mut groups: BTreeMap<&str, Vec<&LegacyUser>> = BTreeMap::new();
    for (user, code) in earliest.into_values() {
        groups.entry(code).or_default().push(user);
    }

    let mut plan = BackfillPlan::default();
    for (code, mut group) in groups {
        group.sort_by_key(|u| (u.created_at, u.user_id));

        let creator = group[0];
        let family = Family {
            id: legacy_family_id(code),
            name: code.to_string(),
            creator_id: creator.user_id,
            created_at: creator.created_at,
        };

        let members = group
            .iter()
            .enumerate()
            .map(|(i, user)| FamilyMember {
                family_id: family.id,
                user_id: user.user_id,
                role: if i == 0 { FamilyRole::Owner } else { FamilyRole::Member },
                joined_at: user.created_at,
            })
            .collect();

        plan.families.push(PlannedFamily { family, members });
    }
    plan
}

/// Writes the plan one family per transaction. Families that already exist
/// are skipped, so an interrupted run can simply be repeated.
pub async fn apply_backfill(store: &Arc<dyn Store>, plan: &BackfillPlan) -> Result<BackfillReport, CoreError> {
    let mut report = BackfillReport::default();
    for planned in &plan.families {
        if planned.members.is_empty() {
            continue;
        }
        if store.find_family(planned.family.id).await?.is_some() {
            debug!("Family {} already backfilled", planned.family.name);
            report.skipped += 1;
            continue;
        }

        let seed = FamilySeed::new(planned.family.clone(), planned.members.clone());
        match store.create_family(&seed).await {
            Ok(()) => {}
            // Written by a concurrent run between the lookup and the insert
            Err(StoreError::Conflict(_)) => {
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        report.created += 1;
        report.memberships += planned.members.len();
        info!(
            "Backfilled family {} ({}) with {} member(s)",
            planned.family.id,
            planned.family.name,
            planned.members.len()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use chrono::Duration;

    fn legacy(code: Option<&str>, age_days: i64) -> LegacyUser {
        LegacyUser {
            user_id: Uuid::new_v4(),
            family_code: code.map(String::from),
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    fn planned<'a>(plan: &'a BackfillPlan, code: &str) -> &'a PlannedFamily {
        let id = legacy_family_id(code);
        plan.families.iter().find(|f| f.family.id == id).unwrap()
    }

    #[test]
    fn earliest_user_owns_each_group() {
        let newer = legacy(Some("smiths"), 1);
        let oldest = legacy(Some("smiths"), 30);
        let middle = legacy(Some(" smiths "), 10);
        let jones = legacy(Some("jones"), 5);
        let loner = legacy(None, 3);
        let blank = legacy(Some("  "), 3);

        let plan = plan_legacy_backfill(&[newer.clone(), oldest.clone(), middle.clone(), jones, loner, blank]);

        assert_eq!(plan.families.len(), 2);
        assert_eq!(plan.member_count(), 4);

        let smiths = planned(&plan, "smiths");
        assert_eq!(smiths.family.creator_id, oldest.user_id);

        let order: Vec<(Uuid, FamilyRole)> = smiths.members.iter().map(|m| (m.user_id, m.role)).collect();
        assert_eq!(
            order,
            vec![
                (oldest.user_id, FamilyRole::Owner),
                (middle.user_id, FamilyRole::Member),
                (newer.user_id, FamilyRole::Member),
            ]
        );
    }

    #[test]
    fn repeated_rows_count_once() {
        let owner = legacy(Some("smiths"), 30);
        let member = legacy(Some("smiths"), 10);
        // Same user again, out of order and under a later code
        let mut again = member.clone();
        again.family_code = Some("jones".to_string());
        again.created_at = member.created_at + Duration::days(1);

        let plan = plan_legacy_backfill(&[member.clone(), owner.clone(), again, member.clone()]);

        assert_eq!(plan.families.len(), 1);
        let members: Vec<Uuid> = planned(&plan, "smiths").members.iter().map(|m| m.user_id).collect();
        assert_eq!(members, vec![owner.user_id, member.user_id]);
    }

    #[test]
    fn family_ids_follow_the_code() {
        assert_eq!(legacy_family_id("smiths"), legacy_family_id(" smiths "));
        assert_ne!(legacy_family_id("smiths"), legacy_family_id("jones"));
        assert!(plan_legacy_backfill(&[]).families.is_empty());
    }

    #[tokio::test]
    async fn apply_writes_memberships_and_shared_folder() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let a = legacy(Some("smiths"), 2);
        let b = legacy(Some("smiths"), 1);

        let plan = plan_legacy_backfill(&[a.clone(), b.clone()]);
        let report = apply_backfill(&store, &plan).await.unwrap();
        assert_eq!(
            report,
            BackfillReport {
                created: 1,
                skipped: 0,
                memberships: 2
            }
        );

        let family_id = legacy_family_id("smiths");
        assert!(store.is_member(family_id, a.user_id).await.unwrap());
        assert!(store.is_member(family_id, b.user_id).await.unwrap());

        let families = store.families_of(a.user_id).await.unwrap();
        assert_eq!(families[0].role, FamilyRole::Owner);
        assert!(store.folders_of(b.user_id).await.unwrap().iter().any(|f| f.family_id == Some(family_id)));
    }

    #[tokio::test]
    async fn rerunning_after_an_interrupted_run_finishes_the_rest() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let smith = legacy(Some("smiths"), 2);
        let jones = legacy(Some("jones"), 1);
        let plan = plan_legacy_backfill(&[smith.clone(), jones.clone()]);

        // First run stopped after writing one family
        let partial = BackfillPlan {
            families: vec![planned(&plan, "smiths").clone()],
        };
        apply_backfill(&store, &partial).await.unwrap();

        let report = apply_backfill(&store, &plan).await.unwrap();
        assert_eq!((report.created, report.skipped), (1, 1));

        let report = apply_backfill(&store, &plan).await.unwrap();
        assert_eq!((report.created, report.skipped), (0, 2));

        assert_eq!(store.families_of(smith.user_id).await.unwrap().len(), 1);
        assert_eq!(store.families_of(jones.user_id).await.unwrap().len(), 1);
        assert_eq!(store.members_of(legacy_family_id("smiths")).await.unwrap().len(), 1);
    }
}
