use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub note_id: Uuid,
    pub name: String,
    pub content_type: String,
    pub size: i64,
    /// Hex SHA-256 of the body
    pub checksum: String,
    #[serde(skip_serializing)]
    pub storage_key: String,
    /// Authenticated download route
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub note_id: Uuid,
    pub user_id: Uuid,
    /// Username at the time the comment was written
    pub username: String,
    pub content: String,
    pub quoted_text: String,
    pub created_at: DateTime<Utc>,
}
