//! JSON envelope shared by every endpoint.
//!
//! Success is `{ text }` (plus `noTextDetected` when nothing was found) or
//! `{ filePath }`; every failure is `{ error, details? }` with 400 for client
//! input problems and 500 for storage or OCR backend problems.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::models::{ExtractionOutcome, ImageReference, PipelineError};
use crate::global_constants;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_text_detected: bool,
}

impl From<ExtractionOutcome> for TextResponse {
    fn from(outcome: ExtractionOutcome) -> Self {
        match outcome {
            ExtractionOutcome::TextDetected(text) => Self {
                text,
                no_text_detected: false,
            },
            ExtractionOutcome::NoTextDetected => Self {
                text: String::new(),
                no_text_detected: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePathResponse {
    pub file_path: ImageReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Stored(FilePathResponse),
    Text(TextResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Validation { .. } => StatusCode::BAD_REQUEST,
        PipelineError::Storage { .. } | PipelineError::BackendUnavailable { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if self.is_client_error() {
            log::warn!("[RESPONSE] {} {}", status.as_u16(), self);
        } else {
            log::error!(
                "[RESPONSE] {} {} ({})",
                status.as_u16(),
                self,
                self.details().unwrap_or_default()
            );
        }

        let body = ErrorResponse {
            error: self.message().to_string(),
            details: self.details().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

/// Body-limit hits become "File too large", anything else a generic bad request.
fn rejection_to_error(status: StatusCode, body_text: String) -> PipelineError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::validation_with_details(global_constants::ERROR_FILE_TOO_LARGE, body_text)
    } else {
        PipelineError::validation_with_details(global_constants::ERROR_INVALID_REQUEST, body_text)
    }
}

impl From<JsonRejection> for PipelineError {
    fn from(rejection: JsonRejection) -> Self {
        rejection_to_error(rejection.status(), rejection.body_text())
    }
}

impl From<BytesRejection> for PipelineError {
    fn from(rejection: BytesRejection) -> Self {
        rejection_to_error(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for PipelineError {
    fn from(rejection: MultipartRejection) -> Self {
        rejection_to_error(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for PipelineError {
    fn from(error: MultipartError) -> Self {
        rejection_to_error(error.status(), error.body_text())
    }
}
