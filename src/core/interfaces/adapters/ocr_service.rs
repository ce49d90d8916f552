use anyhow::Result;
use async_trait::async_trait;

use crate::core::models::{OcrResult, UploadedImage};

#[async_trait]
pub trait OcrService: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Runs recognition on one image. An image without text is `Ok` with an
    /// empty result; `Err` is reserved for the backend itself failing.
    async fn extract_text_from_image(&self, image: &UploadedImage) -> Result<OcrResult>;
}
