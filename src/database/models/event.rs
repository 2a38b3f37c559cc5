use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    #[default]
    Solar,
    Lunar,
    /// Statutory holiday
    Holiday,
    /// Solar term
    Term,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Solar => "solar",
            EventType::Lunar => "lunar",
            EventType::Holiday => "holiday",
            EventType::Term => "term",
        }
    }
}

impl TryFrom<String> for EventType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "solar" => Ok(EventType::Solar),
            "lunar" => Ok(EventType::Lunar),
            "holiday" => Ok(EventType::Holiday),
            "term" => Ok(EventType::Term),
            _ => Err(UnknownVariant { kind: "event type", value }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Yearly => "yearly",
        }
    }
}

impl TryFrom<String> for Recurrence {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "none" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            "yearly" => Ok(Recurrence::Yearly),
            _ => Err(UnknownVariant { kind: "recurrence", value }),
        }
    }
}

/// Calendar entry. System events have no owner and are read-only for everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub family_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub event_type: EventType,
    #[sqlx(try_from = "String")]
    pub recurrence: Recurrence,
    pub notify_users: Vec<Uuid>,
    pub show_countdown: bool,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}
