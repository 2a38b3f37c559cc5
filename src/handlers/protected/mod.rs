// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every handler here receives the caller as `Extension<AuthUser>`, inserted
// by `jwt_auth_middleware`. Visibility and write checks happen in the
// services, never in the handlers.

pub mod auth; // GET /api/auth/whoami
pub mod events; // /api/events
pub mod family; // /api/family
pub mod folders; // /api/folders
pub mod notes; // /api/notes and per-note collaborators, comments, attachments
pub mod users; // /api/users/search

use serde::Serialize;
use uuid::Uuid;

/// Body returned by DELETE endpoints
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

impl Deleted {
    pub fn new(id: Uuid) -> Self {
        Self { id, deleted: true }
    }
}
