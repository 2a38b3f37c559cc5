// handlers/protected/auth/mod.rs - GET /api/auth/whoami handler

use axum::{extract::State, Extension};

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /api/auth/whoami - Current user's profile
pub async fn whoami(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    let profile = state.accounts.whoami(user.user_id).await?;
    Ok(ApiResponse::success(profile))
}
