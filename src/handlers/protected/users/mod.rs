// handlers/protected/users/mod.rs - GET /api/users/search handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Extension,
};
use serde::Deserialize;

use crate::database::models::UserSummary;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// GET /api/users/search?q=ali - Up to five users whose name contains `q`
pub async fn search(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Vec<UserSummary>> {
    let Query(params) = params?;
    Ok(ApiResponse::success(state.accounts.search_users(&params.q).await?))
}
