use axum::extract::{FromRequest, Request, State};
use axum::Json;
use serde::Deserialize;

use crate::core::models::{ImageReference, PipelineError};
use crate::global_constants;
use crate::presentation::response_envelope::TextResponse;
use crate::presentation::routes::AppState;
use crate::presentation::upload_handlers::{is_multipart, read_image_from_request};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTextRequest {
    pub file_path: Option<String>,
}

/// `POST /api/extract-text`.
///
/// A JSON body `{ "filePath": ... }` consumes a stored reference. A multipart
/// body is recognized directly, the single-call shape, and nothing is stored.
pub async fn extract_text(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<TextResponse>, PipelineError> {
    if is_multipart(request.headers()) {
        let image =
            read_image_from_request(&state, request, global_constants::ERROR_NO_FILE_UPLOADED)
                .await?;
        let outcome = state.pipeline.recognize(&image).await?;
        return Ok(Json(TextResponse::from(outcome)));
    }

    let Json(payload) = Json::<ExtractTextRequest>::from_request(request, &state).await?;
    let reference = ImageReference::parse_client_supplied(payload.file_path.as_deref())?;

    log::info!("[EXTRACT] Extracting text from {}", reference);
    let outcome = state.pipeline.extract(&reference).await?;
    Ok(Json(TextResponse::from(outcome)))
}
