// handlers/protected/family/mod.rs - Family lifecycle and family-scoped listings
//
// Non-members get 403 on every family-scoped route, whether or not the
// family exists.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{Event, FamilyMember, FamilyMembership, MemberEntry, Note};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::CreatedFamily;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFamilyRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub family_id: Uuid,
    pub remaining_members: i64,
    pub family_deleted: bool,
}

/// GET /api/family - Families the caller belongs to, oldest membership first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<FamilyMembership>> {
    Ok(ApiResponse::success(state.families.my_families(user.user_id).await?))
}

/// POST /api/family - Create a family owned by the caller, with its shared folder
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateFamilyRequest>, JsonRejection>,
) -> ApiResult<CreatedFamily> {
    let Json(request) = payload?;
    let family = state.families.create(user.user_id, &request.name).await?;
    Ok(ApiResponse::created(family))
}

/// POST /api/family/:id/join - 404 FAMILY_NOT_FOUND, 409 ALREADY_MEMBER
pub async fn join(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<FamilyMember> {
    let member = state.families.join(user.user_id, family_id).await?;
    Ok(ApiResponse::created(member))
}

/// POST /api/family/:id/leave - 400 NOT_A_MEMBER
pub async fn leave(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<LeaveResponse> {
    let removal = state.families.leave(user.user_id, family_id).await?;
    Ok(ApiResponse::success(LeaveResponse {
        family_id,
        remaining_members: removal.remaining_members,
        family_deleted: removal.family_deleted,
    }))
}

/// GET /api/family/:id/members
pub async fn members(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Vec<MemberEntry>> {
    Ok(ApiResponse::success(state.families.members(user.user_id, family_id).await?))
}

/// GET /api/family/:id/notes
pub async fn notes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Vec<Note>> {
    Ok(ApiResponse::success(state.notes.list_family(user.user_id, family_id).await?))
}

/// GET /api/family/:id/events
pub async fn events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Vec<Event>> {
    Ok(ApiResponse::success(state.events.list_family(user.user_id, family_id).await?))
}
