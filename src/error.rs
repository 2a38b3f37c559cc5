// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::services::CoreError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError(String),
    InvalidJson(String),
    NotAMember(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
    FamilyNotFound(String),

    // 409 Conflict
    Conflict(String),
    AlreadyMember(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::ValidationError(_)
            | ApiError::InvalidJson(_)
            | ApiError::NotAMember(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::FamilyNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::AlreadyMember(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::ValidationError(msg)
            | ApiError::InvalidJson(msg)
            | ApiError::NotAMember(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::FamilyNotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::AlreadyMember(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::NotAMember(_) => "NOT_A_MEMBER",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::FamilyNotFound(_) => "FAMILY_NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::AlreadyMember(_) => "ALREADY_MEMBER",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        })
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        ApiError::ValidationError(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::Forbidden(msg) => ApiError::Forbidden(msg),
            err @ CoreError::AlreadyMember => ApiError::AlreadyMember(err.to_string()),
            err @ CoreError::NotAMember => ApiError::NotAMember(err.to_string()),
            err @ CoreError::FamilyNotFound => ApiError::FamilyNotFound(err.to_string()),
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            CoreError::ValidationFailed(msg) => ApiError::validation_error(msg),
            CoreError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            CoreError::PayloadTooLarge(msg) => ApiError::PayloadTooLarge(msg),
            CoreError::Store(e) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Store error: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            CoreError::Blob(e) => {
                tracing::error!("Blob store error: {}", e);
                ApiError::internal_server_error("File storage is unavailable")
            }
            CoreError::Token(e) => {
                tracing::error!("Token error: {}", e);
                ApiError::internal_server_error("Failed to issue token")
            }
            CoreError::Credential(e) => {
                tracing::error!("Credential error: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StoreError;

    #[test]
    fn membership_errors_have_distinct_codes() {
        let already = ApiError::from(CoreError::AlreadyMember);
        assert_eq!(already.status_code(), StatusCode::CONFLICT);
        assert_eq!(already.error_code(), "ALREADY_MEMBER");

        let missing = ApiError::from(CoreError::FamilyNotFound);
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.error_code(), "FAMILY_NOT_FOUND");

        assert_eq!(ApiError::from(CoreError::NotAMember).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = ApiError::from(CoreError::from(StoreError::QueryError("relation \"notes\" does not exist".into())));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("notes"));
    }

    #[test]
    fn envelope_shape() {
        let body = ApiError::forbidden("nope").to_json();
        assert_eq!(body, json!({"success": false, "error": "nope", "code": "FORBIDDEN"}));
    }

    #[test]
    fn validation_failures_use_the_plain_envelope() {
        let body = ApiError::from(CoreError::ValidationFailed("Title must not be empty".into())).to_json();
        assert_eq!(
            body,
            json!({"success": false, "error": "Title must not be empty", "code": "VALIDATION_ERROR"})
        );
    }
}
