use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Extract JWT from Authorization header
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;

    let identity = state.tokens.parse(&token).map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    // Tokens outlive deleted accounts
    let user = state
        .store
        .find_user(identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Store error while authenticating: {}", e);
            ApiError::service_unavailable("Database temporarily unavailable")
        })?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    request.extensions_mut().insert(AuthUser {
        user_id: user.id,
        username: user.username,
    });

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
