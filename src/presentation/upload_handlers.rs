use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Deserialize;

use crate::core::models::{PipelineError, UploadedImage};
use crate::global_constants;
use crate::presentation::base64_payload::decode_image_payload;
use crate::presentation::response_envelope::{FilePathResponse, TextResponse, UploadResponse};
use crate::presentation::routes::AppState;
use crate::server_settings::PipelineMode;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base64UploadRequest {
    pub image: Option<String>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

/// `POST /api/upload`: multipart field `image` or a raw `image/*` body.
pub async fn upload_image(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<UploadResponse>, PipelineError> {
    let image =
        read_image_from_request(&state, request, global_constants::ERROR_NO_FILE_UPLOADED).await?;

    let response = match state.pipeline_mode {
        PipelineMode::SingleCall => {
            let outcome = state.pipeline.recognize(&image).await?;
            UploadResponse::Text(TextResponse::from(outcome))
        }
        PipelineMode::TwoCall => {
            let file_path = state.pipeline.ingest(&image).await?;
            UploadResponse::Stored(FilePathResponse { file_path })
        }
    };

    Ok(Json(response))
}

/// `POST /api/upload-base64`: `{ "image": "<base64>" }`, always stored.
pub async fn upload_base64(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<FilePathResponse>, PipelineError> {
    let Json(payload) = Json::<Base64UploadRequest>::from_request(request, &state).await?;

    let raw = payload
        .image
        .ok_or_else(|| PipelineError::validation(global_constants::ERROR_NO_IMAGE_DATA))?;
    let decoded = decode_image_payload(&raw)?;
    let declared_mime_type = payload.mime_type.or(decoded.mime_type);

    log::info!(
        "[UPLOAD] Base64 upload: name={:?}, size={}, mimetype={:?}",
        payload.file_name,
        decoded.bytes.len(),
        declared_mime_type
    );

    let image = UploadedImage::build_from_bytes(
        decoded.bytes,
        declared_mime_type.as_deref(),
        payload.file_name.as_deref(),
        state.pipeline.max_upload_bytes(),
        global_constants::ERROR_NO_IMAGE_DATA,
    )?;

    let file_path = state.pipeline.ingest(&image).await?;
    Ok(Json(FilePathResponse { file_path }))
}

pub(crate) fn is_multipart(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with("multipart/form-data")
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Pulls exactly one image out of a multipart form or a raw binary body.
/// Anything else counts as "no file".
pub(crate) async fn read_image_from_request(
    state: &AppState,
    request: Request,
    empty_payload_message: &str,
) -> Result<UploadedImage, PipelineError> {
    let max_bytes = state.pipeline.max_upload_bytes();
    let content_type = content_type(request.headers());

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state).await?;
        return read_multipart_image(multipart, max_bytes, empty_payload_message).await;
    }

    if content_type.starts_with("image/") || content_type.starts_with("application/octet-stream") {
        let bytes = Bytes::from_request(request, state).await?;
        log::info!(
            "[UPLOAD] Raw upload: size={}, mimetype={}",
            bytes.len(),
            content_type
        );
        return UploadedImage::build_from_bytes(
            bytes.to_vec(),
            Some(content_type.as_str()),
            None,
            max_bytes,
            empty_payload_message,
        );
    }

    log::warn!(
        "[UPLOAD] No file uploaded (content type '{}')",
        content_type
    );
    Err(PipelineError::validation(empty_payload_message))
}

async fn read_multipart_image(
    mut multipart: Multipart,
    max_bytes: usize,
    empty_payload_message: &str,
) -> Result<UploadedImage, PipelineError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(global_constants::IMAGE_FIELD_NAME) {
            log::debug!("[UPLOAD] Skipping multipart field {:?}", field.name());
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let mime_type = field.content_type().map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(PipelineError::validation_with_details(
                    global_constants::ERROR_FILE_TOO_LARGE,
                    format!("image exceeds the limit of {} bytes", max_bytes),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        log::info!(
            "[UPLOAD] Uploaded file info: name={:?}, size={}, mimetype={:?}",
            file_name,
            bytes.len(),
            mime_type
        );

        return UploadedImage::build_from_bytes(
            bytes,
            mime_type.as_deref(),
            file_name.as_deref(),
            max_bytes,
            empty_payload_message,
        );
    }

    log::warn!("[UPLOAD] Multipart form had no '{}' field", global_constants::IMAGE_FIELD_NAME);
    Err(PipelineError::validation(empty_payload_message))
}
