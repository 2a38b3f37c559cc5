// handlers/protected/notes/collaborators.rs - Per-note sharing grants

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{Collaborator, Permission};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub permission: Permission,
}

#[derive(Debug, Serialize)]
pub struct Revoked {
    pub note_id: Uuid,
    pub user_id: Uuid,
    pub revoked: bool,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Vec<Collaborator>> {
    Ok(ApiResponse::success(state.notes.collaborators(user.user_id, note_id).await?))
}

/// PUT /api/notes/:id/collaborators/:user_id - Grant `read` or `write`
///
/// ```json
/// { "permission": "write" }
/// ```
pub async fn grant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((note_id, collaborator_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<GrantRequest>, JsonRejection>,
) -> ApiResult<Collaborator> {
    let Json(request) = payload?;
    let collaborator = state
        .notes
        .grant(user.user_id, note_id, collaborator_id, request.permission)
        .await?;
    Ok(ApiResponse::success(collaborator))
}

pub async fn revoke(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((note_id, collaborator_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Revoked> {
    state.notes.revoke(user.user_id, note_id, collaborator_id).await?;
    Ok(ApiResponse::success(Revoked {
        note_id,
        user_id: collaborator_id,
        revoked: true,
    }))
}
