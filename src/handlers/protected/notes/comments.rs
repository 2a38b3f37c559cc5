// handlers/protected/notes/comments.rs - Comment thread on a note

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::Comment;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::NewComment;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Vec<Comment>> {
    Ok(ApiResponse::success(state.comments.list(user.user_id, note_id).await?))
}

/// POST /api/notes/:id/comments - Any reader of the note may comment
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> ApiResult<Comment> {
    let Json(new) = payload?;
    Ok(ApiResponse::created(state.comments.create(user.user_id, note_id, new).await?))
}
