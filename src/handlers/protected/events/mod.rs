// handlers/protected/events/mod.rs - Calendar event handlers
//
// System events are listed to everyone but cannot be changed through the
// API.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::Event;
use crate::handlers::protected::Deleted;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{EventFilter, EventPatch, NewEvent};
use crate::state::AppState;

/// GET /api/events?start=...&end=... - Visible events by date
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    filter: Result<Query<EventFilter>, QueryRejection>,
) -> ApiResult<Vec<Event>> {
    let Query(filter) = filter?;
    Ok(ApiResponse::success(state.events.list_visible(user.user_id, &filter).await?))
}

/// POST /api/events - Create an event
///
/// Request body:
/// ```json
/// {
///   "title": "Dentist",
///   "date": "2024-03-14T09:30:00Z",
///   "event_type": "solar",
///   "recurrence": "none",
///   "family_id": null
/// }
/// ```
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> ApiResult<Event> {
    let Json(new) = payload?;
    Ok(ApiResponse::created(state.events.create(user.user_id, new).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
    payload: Result<Json<EventPatch>, JsonRejection>,
) -> ApiResult<Event> {
    let Json(patch) = payload?;
    Ok(ApiResponse::success(state.events.update(user.user_id, event_id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Deleted> {
    state.events.delete(user.user_id, event_id).await?;
    Ok(ApiResponse::success(Deleted::new(event_id)))
}
