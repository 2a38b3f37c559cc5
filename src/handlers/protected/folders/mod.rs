// handlers/protected/folders/mod.rs - Folder handlers
//
// Listings include the shared folder of each family the caller belongs to.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::Folder;
use crate::handlers::protected::Deleted;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::NewFolder;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Folder>> {
    Ok(ApiResponse::success(state.folders.list(user.user_id).await?))
}

/// POST /api/folders - `{"name": "Recipes", "icon": "book"}`
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NewFolder>, JsonRejection>,
) -> ApiResult<Folder> {
    let Json(new) = payload?;
    Ok(ApiResponse::created(state.folders.create(user.user_id, new).await?))
}

/// DELETE /api/folders/:id - Notes in the folder are kept and unfiled; 403 for shared folders
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(folder_id): Path<Uuid>,
) -> ApiResult<Deleted> {
    state.folders.delete(user.user_id, folder_id).await?;
    Ok(ApiResponse::success(Deleted::new(folder_id)))
}
