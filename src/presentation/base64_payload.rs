use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::core::models::PipelineError;
use crate::global_constants;

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedPayload {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Decodes a base64 image string, optionally wrapped as a
/// `data:<mime>;base64,<payload>` URL. Embedded whitespace is ignored.
pub fn decode_image_payload(raw: &str) -> Result<DecodedPayload, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::validation(global_constants::ERROR_NO_IMAGE_DATA));
    }

    let (mime_type, encoded) = match trimmed.strip_prefix("data:") {
        Some(data_url) => {
            let (header, payload) = data_url.split_once(',').ok_or_else(|| {
                PipelineError::validation_with_details(
                    global_constants::ERROR_INVALID_BASE64,
                    "data URL has no payload",
                )
            })?;
            let mut parts = header.split(';');
            let mime_type = parts.next().map(str::trim).filter(|mime| !mime.is_empty());
            if !parts.any(|part| part.trim().eq_ignore_ascii_case("base64")) {
                return Err(PipelineError::validation_with_details(
                    global_constants::ERROR_INVALID_BASE64,
                    "data URL is not base64 encoded",
                ));
            }
            (mime_type.map(str::to_string), payload)
        }
        None => (None, trimmed),
    };

    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(PipelineError::validation(global_constants::ERROR_NO_IMAGE_DATA));
    }

    let bytes = LENIENT_STANDARD.decode(compact.as_bytes()).map_err(|error| {
        PipelineError::validation_with_details(global_constants::ERROR_INVALID_BASE64, error)
    })?;

    Ok(DecodedPayload { bytes, mime_type })
}
