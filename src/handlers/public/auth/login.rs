// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::LoginOutcome;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/auth/login - Authenticate user and receive JWT token
///
/// Expected Input:
/// ```json
/// { "username": "alice", "password": "secret1" }
/// ```
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiI...",
///     "user": { "id": "...", "username": "alice", "avatar_color": "#60A5FA", ... },
///     "expires_in": 86400
///   }
/// }
/// ```
///
/// Unknown usernames and wrong passwords both return 401 with the same message.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginOutcome> {
    let Json(request) = payload?;
    let outcome = state.accounts.login(&request.username, &request.password).await?;
    Ok(ApiResponse::success(outcome))
}
