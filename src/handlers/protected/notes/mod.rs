// handlers/protected/notes/mod.rs - Note routes
//
// GET    /api/notes                              list visible notes
// POST   /api/notes                              create
// GET    /api/notes/:id                          fetch one
// PATCH  /api/notes/:id                          partial update
// DELETE /api/notes/:id                          soft delete
// POST   /api/notes/:id/restore                  undelete within the window
// GET    /api/notes/:id/collaborators            list grants
// PUT    /api/notes/:id/collaborators/:user_id   grant or change
// DELETE /api/notes/:id/collaborators/:user_id   revoke
// GET    /api/notes/:id/comments                 list
// POST   /api/notes/:id/comments                 add
// GET    /api/notes/:id/attachments              list
// POST   /api/notes/:id/attachments?name=...     upload raw body
// GET    /api/notes/:id/attachments/:attachment_id  download raw body

pub mod attachments;
pub mod collaborators;
pub mod comments;
pub mod crud;

pub use crud::{create, delete, get, list, restore, update};
