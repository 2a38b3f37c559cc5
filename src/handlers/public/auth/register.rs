// handlers/public/auth/register.rs - Two-step registration
//
// 1. POST /api/auth/register/request parks the credentials behind a one-shot
//    numeric code. The code is delivered out of band (logged for the operator).
// 2. POST /api/auth/register/verify consumes the code and creates the account.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{LoginOutcome, RegistrationTicket};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub username: String,
    pub code: String,
}

/// POST /api/auth/register/request - Start registration
///
/// Returns `{ "username": "...", "expires_in": 300 }`. 409 if the username is taken.
pub async fn register_request(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<RegistrationTicket> {
    let Json(request) = payload?;
    let ticket = state
        .accounts
        .request_registration(&request.username, &request.password)
        .await?;
    Ok(ApiResponse::success(ticket))
}

/// POST /api/auth/register/verify - Finish registration and log in
pub async fn register_verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<LoginOutcome> {
    let Json(request) = payload?;
    let outcome = state
        .accounts
        .verify_registration(&request.username, &request.code)
        .await?;
    Ok(ApiResponse::created(outcome))
}
