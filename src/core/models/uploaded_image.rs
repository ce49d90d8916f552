use std::fmt;

use crate::core::models::{ImageFormat, PipelineError};
use crate::global_constants;

/// An image received by the ingest endpoint, already validated.
#[derive(Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub mime_type: String,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    bytes: Vec<u8>,
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadedImage {
    /// Validates raw upload bytes and wraps them.
    ///
    /// The payload must be non-empty, at most `max_size_bytes`, and sniff as a
    /// supported image. A declared MIME type other than `image/*` or
    /// `application/octet-stream` is rejected; when it is absent or generic the
    /// sniffed format's MIME type is used instead.
    pub fn build_from_bytes(
        bytes: Vec<u8>,
        declared_mime_type: Option<&str>,
        file_name: Option<&str>,
        max_size_bytes: usize,
        empty_payload_message: &str,
    ) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::validation(empty_payload_message));
        }

        if bytes.len() > max_size_bytes {
            return Err(PipelineError::validation_with_details(
                global_constants::ERROR_FILE_TOO_LARGE,
                format!(
                    "{} bytes exceeds the limit of {} bytes",
                    bytes.len(),
                    max_size_bytes
                ),
            ));
        }

        if let Some(declared) = declared_mime_type {
            let declared = declared.trim().to_ascii_lowercase();
            let is_generic =
                declared.is_empty() || declared.starts_with("application/octet-stream");
            if !is_generic && !declared.starts_with("image/") {
                return Err(PipelineError::validation_with_details(
                    global_constants::ERROR_UNSUPPORTED_IMAGE,
                    format!("declared content type '{}' is not an image", declared),
                ));
            }
        }

        let format = ImageFormat::sniff(&bytes).ok_or_else(|| {
            PipelineError::validation_with_details(
                global_constants::ERROR_UNSUPPORTED_IMAGE,
                "payload is not a recognized image format",
            )
        })?;

        if let Some(declared) = declared_mime_type.and_then(ImageFormat::from_mime_type) {
            if declared != format {
                log::debug!(
                    "[UPLOADED_IMAGE] declared {:?} but content is {:?}, using content",
                    declared,
                    format
                );
            }
        }

        let (width, height) = image::ImageReader::new(std::io::Cursor::new(&bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok())
            .ok_or_else(|| {
                PipelineError::validation_with_details(
                    global_constants::ERROR_UNSUPPORTED_IMAGE,
                    "image header could not be decoded",
                )
            })?;

        let file_name = file_name
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "{}.{}",
                    global_constants::DEFAULT_UPLOAD_FILE_NAME,
                    format.file_extension()
                )
            });

        log::debug!(
            "[UPLOADED_IMAGE] accepted {} ({} bytes, {:?}, {}x{})",
            file_name,
            bytes.len(),
            format,
            width,
            height
        );

        Ok(Self {
            file_name,
            mime_type: format.mime_type().to_string(),
            format,
            width,
            height,
            bytes,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Keeps only the final path component so a client-chosen name never
/// becomes a path.
fn sanitize_file_name(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_build_from_bytes_accepts_png_without_declared_type() {
        let image =
            UploadedImage::build_from_bytes(png_bytes(), None, Some("photo.png"), 1024, "empty")
                .unwrap();

        assert_eq!(image.format, ImageFormat::PNG);
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.file_name, "photo.png");
        assert_eq!((image.width, image.height), (2, 2));
    }

    #[test]
    fn test_build_from_bytes_rejects_truncated_image() {
        let bytes = png_bytes()[..12].to_vec();

        let error = UploadedImage::build_from_bytes(bytes, None, None, 1024, "empty").unwrap_err();

        assert_eq!(error.message(), global_constants::ERROR_UNSUPPORTED_IMAGE);
    }

    #[test]
    fn test_build_from_bytes_rejects_empty_payload_with_given_message() {
        let error =
            UploadedImage::build_from_bytes(vec![], None, None, 1024, "No file uploaded").unwrap_err();

        assert_eq!(error, PipelineError::validation("No file uploaded"));
    }

    #[test]
    fn test_build_from_bytes_rejects_oversized_payload() {
        let bytes = png_bytes();
        let limit = bytes.len() - 1;

        let error = UploadedImage::build_from_bytes(bytes, None, None, limit, "empty").unwrap_err();

        assert_eq!(error.message(), global_constants::ERROR_FILE_TOO_LARGE);
        assert!(error.is_client_error());
    }

    #[test]
    fn test_build_from_bytes_rejects_non_image_declared_type() {
        let error =
            UploadedImage::build_from_bytes(png_bytes(), Some("text/plain"), None, 1024, "empty")
                .unwrap_err();

        assert_eq!(error.message(), global_constants::ERROR_UNSUPPORTED_IMAGE);
    }

    #[test]
    fn test_build_from_bytes_accepts_octet_stream_and_uses_sniffed_type() {
        let image = UploadedImage::build_from_bytes(
            png_bytes(),
            Some("application/octet-stream"),
            None,
            1024,
            "empty",
        )
        .unwrap();

        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.file_name, "upload.png");
    }

    #[test]
    fn test_build_from_bytes_rejects_bytes_that_are_not_an_image() {
        let error = UploadedImage::build_from_bytes(
            b"definitely not an image".to_vec(),
            Some("image/png"),
            None,
            1024,
            "empty",
        )
        .unwrap_err();

        assert_eq!(error.message(), global_constants::ERROR_UNSUPPORTED_IMAGE);
    }

    #[test]
    fn test_sanitize_file_name_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\receipt.jpg"), "receipt.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
    }
}
