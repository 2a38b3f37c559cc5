// handlers/protected/notes/attachments.rs - File attachments on a note
//
// Uploads are the raw request body. The file name comes from `?name=` and
// the MIME type from the Content-Type header. Downloads return the stored
// body with the same MIME type.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::Attachment;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{Download, Upload};
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: String,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Vec<Attachment>> {
    Ok(ApiResponse::success(state.attachments.list(user.user_id, note_id).await?))
}

/// POST /api/notes/:id/attachments?name=receipt.pdf - Editors only
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(note_id): Path<Uuid>,
    params: Result<Query<UploadParams>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Attachment> {
    let Query(params) = params?;
    let bytes = body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(format!(
            "Attachments are limited to {} bytes",
            state.max_upload_bytes
        )),
        _ => ApiError::bad_request(rejection.body_text()),
    })?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let upload = Upload {
        name: params.name,
        content_type,
        bytes: bytes.to_vec(),
    };
    Ok(ApiResponse::created(state.attachments.upload(user.user_id, note_id, upload).await?))
}

/// GET /api/notes/:id/attachments/:attachment_id - Raw body, for anyone who can read the note
pub async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((note_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let Download { attachment, bytes } = state
        .attachments
        .download(user.user_id, note_id, attachment_id)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&attachment.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", header_safe(&attachment.name)))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    // Rows written before checksums were recorded carry an empty one
    if !attachment.checksum.is_empty() {
        if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", attachment.checksum)) {
            headers.insert(header::ETAG, etag);
        }
    }
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    Ok((headers, bytes).into_response())
}

/// Printable ASCII only, without quotes or backslashes
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect()
}
