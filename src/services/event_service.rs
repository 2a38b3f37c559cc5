use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::{Event, EventType, Recurrence};
use crate::database::{EventQuery, Store};
use crate::visibility::{ResourceKind, Visibility, VisibilityResolver};

use super::{validate_name, CoreError};

const MAX_TITLE: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default)]
    pub recurrence: Recurrence,
    pub family_id: Option<Uuid>,
    #[serde(default)]
    pub notify_users: Vec<Uuid>,
    #[serde(default)]
    pub show_countdown: bool,
}

/// Partial update of an event. Only the owner may send one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub event_type: Option<EventType>,
    pub recurrence: Option<Recurrence>,
    #[serde(default, deserialize_with = "crate::visibility::access::double_option")]
    pub family_id: Option<Option<Uuid>>,
    pub notify_users: Option<Vec<Uuid>>,
    pub show_countdown: Option<bool>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.event_type.is_none()
            && self.recurrence.is_none()
            && self.family_id.is_none()
            && self.notify_users.is_none()
            && self.show_countdown.is_none()
    }

    fn apply(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if let Some(recurrence) = self.recurrence {
            event.recurrence = recurrence;
        }
        if let Some(family_id) = self.family_id {
            event.family_id = family_id;
        }
        if let Some(notify_users) = self.notify_users {
            event.notify_users = notify_users;
        }
        if let Some(show_countdown) = self.show_countdown {
            event.show_countdown = show_countdown;
        }
    }
}

/// Inclusive date range; both ends or neither.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventFilter {
    fn range(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, CoreError> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) if start <= end => Ok(Some((start, end))),
            (Some(_), Some(_)) => Err(CoreError::ValidationFailed(
                "start must not be after end".to_string(),
            )),
            _ => Err(CoreError::ValidationFailed(
                "start and end must be given together".to_string(),
            )),
        }
    }
}

/// Outcome of publishing a batch of system events
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub published: Vec<Event>,
    /// Entries matching an existing system event by title and date
    pub skipped: usize,
}

#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn Store>,
    resolver: VisibilityResolver,
    clock: Arc<dyn Clock>,
}

impl EventService {
    pub fn new(store: Arc<dyn Store>, resolver: VisibilityResolver, clock: Arc<dyn Clock>) -> Self {
        Self { store, resolver, clock }
    }

    /// Own unshared events plus every system event.
    pub async fn list_visible(&self, actor: Uuid, filter: &EventFilter) -> Result<Vec<Event>, CoreError> {
        let query = EventQuery {
            visibility: self.resolver.personal_scope(actor, ResourceKind::Event),
            range: filter.range()?,
        };
        Ok(self.store.select_events(&query).await?)
    }

    pub async fn list_family(&self, actor: Uuid, family_id: Uuid) -> Result<Vec<Event>, CoreError> {
        let query = EventQuery {
            visibility: self.resolver.family_scope(actor, family_id, ResourceKind::Event).await?,
            range: None,
        };
        Ok(self.store.select_events(&query).await?)
    }

    pub async fn create(&self, actor: Uuid, new: NewEvent) -> Result<Event, CoreError> {
        if let Some(family_id) = new.family_id {
            self.resolver.require_member(actor, family_id).await?;
        }
        let event = self.build(Some(actor), new, false)?;
        self.store.insert_event(&event).await?;
        Ok(event)
    }

    /// Publishes an ownerless event visible to every user. Only the
    /// `events seed` command reaches this; there is no HTTP route.
    pub async fn create_system(&self, new: NewEvent) -> Result<Event, CoreError> {
        let event = self.build(None, NewEvent { family_id: None, ..new }, true)?;
        self.store.insert_event(&event).await?;
        info!("Published system event {} ({})", event.id, event.title);
        Ok(event)
    }

    /// Publishes each entry unless a live system event with the same title
    /// and date already exists, so a seed file can be loaded repeatedly.
    /// Every entry is validated before anything is written.
    pub async fn seed_system(&self, entries: Vec<NewEvent>) -> Result<SeedReport, CoreError> {
        for entry in &entries {
            validate_name("Title", &entry.title, MAX_TITLE)?;
        }

        let query = EventQuery {
            visibility: Visibility::system_events(),
            range: None,
        };
        let mut seen: HashSet<(String, DateTime<Utc>)> = self
            .store
            .select_events(&query)
            .await?
            .into_iter()
            .map(|event| (event.title, event.date))
            .collect();

        let mut report = SeedReport::default();
        for entry in entries {
            let key = (entry.title.trim().to_string(), entry.date);
            if !seen.insert(key) {
                report.skipped += 1;
                continue;
            }
            report.published.push(self.create_system(entry).await?);
        }
        Ok(report)
    }

    pub async fn update(&self, actor: Uuid, event_id: Uuid, patch: EventPatch) -> Result<Event, CoreError> {
        if patch.is_empty() {
            return Err(CoreError::ValidationFailed("No fields to update".to_string()));
        }

        let mut event = self.writable(actor, event_id).await?;
        if let Some(title) = &patch.title {
            validate_name("Title", title, MAX_TITLE)?;
        }
        if let Some(Some(family_id)) = patch.family_id {
            self.resolver.require_member(actor, family_id).await?;
        }

        patch.apply(&mut event);
        event.title = event.title.trim().to_string();
        event.updated_at = self.clock.now();
        self.store.update_event(&event).await?;
        Ok(event)
    }

    /// Soft delete. Owner only.
    pub async fn delete(&self, actor: Uuid, event_id: Uuid) -> Result<(), CoreError> {
        let event = self.writable(actor, event_id).await?;
        self.store.set_event_deleted(event.id, Some(self.clock.now())).await?;
        info!("User {} deleted event {}", actor, event.id);
        Ok(())
    }

    /// Live event `actor` can see and change. Invisible events are
    /// `NotFound`, visible read-only ones `Forbidden`.
    async fn writable(&self, actor: Uuid, event_id: Uuid) -> Result<Event, CoreError> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .filter(|event| event.deleted_at.is_none())
            .ok_or_else(not_found)?;

        if !self.resolver.can_view_event(actor, &event).await? {
            return Err(not_found());
        }
        self.resolver.authorize_event_write(actor, &event)?;
        Ok(event)
    }

    fn build(&self, owner: Option<Uuid>, new: NewEvent, is_system: bool) -> Result<Event, CoreError> {
        let title = validate_name("Title", &new.title, MAX_TITLE)?;
        let now = self.clock.now();
        Ok(Event {
            id: Uuid::new_v4(),
            user_id: owner,
            family_id: new.family_id,
            title,
            description: new.description,
            date: new.date,
            event_type: new.event_type,
            recurrence: new.recurrence,
            notify_users: new.notify_users,
            show_countdown: new.show_countdown,
            is_system,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

fn not_found() -> CoreError {
    CoreError::NotFound("Event not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::database::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn service() -> EventService {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        EventService::new(store.clone(), VisibilityResolver::new(store), Arc::new(SystemClock))
    }

    fn new_event(title: &str, date: DateTime<Utc>) -> NewEvent {
        NewEvent {
            title: title.to_string(),
            description: String::new(),
            date,
            event_type: EventType::Solar,
            recurrence: Recurrence::None,
            family_id: None,
            notify_users: vec![],
            show_countdown: false,
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn system_events_are_visible_to_everyone_and_read_only() {
        let events = service();
        let holiday = events.create_system(new_event("New Year", day(1))).await.unwrap();

        for _ in 0..3 {
            let user = Uuid::new_v4();
            let visible = events.list_visible(user, &EventFilter::default()).await.unwrap();
            assert!(visible.iter().any(|e| e.id == holiday.id));

            let patch = EventPatch {
                title: Some("Mine now".to_string()),
                ..EventPatch::default()
            };
            assert!(matches!(
                events.update(user, holiday.id, patch).await,
                Err(CoreError::Forbidden(_))
            ));
            assert!(matches!(events.delete(user, holiday.id).await, Err(CoreError::Forbidden(_))));
        }
    }

    #[tokio::test]
    async fn range_filter_is_inclusive() {
        let events = service();
        let me = Uuid::new_v4();
        for d in [1, 5, 10] {
            events.create(me, new_event(&format!("day {}", d), day(d))).await.unwrap();
        }

        let filter = EventFilter {
            start: Some(day(5)),
            end: Some(day(10)),
        };
        let titles: Vec<String> = events
            .list_visible(me, &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["day 5", "day 10"]);
    }

    #[tokio::test]
    async fn half_open_range_is_rejected() {
        let filter = EventFilter {
            start: Some(Utc::now()),
            end: None,
        };
        assert!(matches!(
            service().list_visible(Uuid::new_v4(), &filter).await,
            Err(CoreError::ValidationFailed(_))
        ));

        let backwards = EventFilter {
            start: Some(Utc::now()),
            end: Some(Utc::now() - Duration::days(1)),
        };
        assert!(matches!(
            service().list_visible(Uuid::new_v4(), &backwards).await,
            Err(CoreError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn other_users_private_events_are_not_found() {
        let events = service();
        let owner = Uuid::new_v4();
        let event = events.create(owner, new_event("dentist", day(3))).await.unwrap();

        assert!(matches!(
            events.delete(Uuid::new_v4(), event.id).await,
            Err(CoreError::NotFound(_))
        ));
        events.delete(owner, event.id).await.unwrap();
        assert!(events.list_visible(owner, &EventFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seeding_twice_publishes_once() {
        let events = service();
        let batch = || vec![new_event("New Year", day(1)), new_event(" Solstice ", day(21))];

        let first = events.seed_system(batch()).await.unwrap();
        assert_eq!((first.published.len(), first.skipped), (2, 0));
        assert!(first.published.iter().all(|e| e.is_system && e.user_id.is_none()));

        let again = events.seed_system(batch()).await.unwrap();
        assert_eq!((again.published.len(), again.skipped), (0, 2));

        let repeated = vec![new_event("Equinox", day(20)), new_event("Equinox", day(20))];
        assert_eq!(events.seed_system(repeated).await.unwrap().skipped, 1);

        // A user's own event of the same name does not block the system copy
        let me = Uuid::new_v4();
        events.create(me, new_event("Full moon", day(25))).await.unwrap();
        let moon = events.seed_system(vec![new_event("Full moon", day(25))]).await.unwrap();
        assert_eq!(moon.published.len(), 1);
        assert_eq!(events.list_visible(me, &EventFilter::default()).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn invalid_seed_entry_writes_nothing() {
        let events = service();
        let batch = vec![new_event("New Year", day(1)), new_event("   ", day(2))];
        assert!(matches!(
            events.seed_system(batch).await,
            Err(CoreError::ValidationFailed(_))
        ));
        assert!(events
            .list_visible(Uuid::new_v4(), &EventFilter::default())
            .await
            .unwrap()
            .is_empty());
    }
}
