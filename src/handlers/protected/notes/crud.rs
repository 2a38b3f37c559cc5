// handlers/protected/notes/crud.rs - Note CRUD handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::Note;
use crate::handlers::protected::Deleted;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{NewNote, NoteFilter};
use crate::state::AppState;
use crate::visibility::NotePatch;

/// GET /api/notes - Notes visible to the caller, most recently updated first
///
/// Query parameters:
/// - `folder_id`: only notes in this folder
/// - `search`: case-insensitive match on title or content
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    filter: Result<Query<NoteFilter>, QueryRejection>,
) -> ApiResult<Vec<Note>> {
    let Query(filter) = filter?;
    Ok(ApiResponse::success(state.notes.list_visible(user.user_id, &filter).await?))
}

/// POST /api/notes - Create a note
///
/// Request body:
/// ```json
/// {
///   "title": "Groceries",
///   "content": "milk, eggs",
///   "family_id": "optional-uuid",
///   "is_public": false
/// }
/// ```
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NewNote>, JsonRejection>,
) -> ApiResult<Note> {
    let Json(new) = payload?;
    Ok(ApiResponse::created(state.notes.create(user.user_id, new).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Note> {
    Ok(ApiResponse::success(state.notes.get(user.user_id, note_id).await?))
}

/// PATCH /api/notes/:id - Partial update
///
/// Editors may change `title`, `content` and `folder_id`. Sharing fields
/// (`is_public`, `public_permission`, `family_id`) belong to the owner.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
    payload: Result<Json<NotePatch>, JsonRejection>,
) -> ApiResult<Note> {
    let Json(patch) = payload?;
    Ok(ApiResponse::success(state.notes.update(user.user_id, note_id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Deleted> {
    state.notes.delete(user.user_id, note_id).await?;
    Ok(ApiResponse::success(Deleted::new(note_id)))
}

/// POST /api/notes/:id/restore - Undo a soft delete
pub async fn restore(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Note> {
    Ok(ApiResponse::success(state.notes.restore(user.user_id, note_id).await?))
}
