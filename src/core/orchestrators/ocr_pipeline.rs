use std::sync::Arc;
use std::time::Duration;

use crate::core::interfaces::adapters::{ClaimedImage, OcrService, TransientStore};
use crate::core::models::{ExtractionOutcome, ImageReference, PipelineError, UploadedImage};
use crate::global_constants;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub ocr_timeout: Duration,
    pub retain_on_backend_failure: bool,
    pub max_upload_bytes: usize,
}

/// Ingest, recognize and clean up.
///
/// Per request the pipeline walks `Received → Validated → Stored →
/// OCRRequested → Succeeded | Failed → CleanedUp → Responded`; callers hand
/// it images that are already validated.
pub struct OcrPipeline {
    ocr_service: Arc<dyn OcrService>,
    transient_store: Arc<dyn TransientStore>,
    options: PipelineOptions,
}

impl OcrPipeline {
    pub fn build(
        ocr_service: Arc<dyn OcrService>,
        transient_store: Arc<dyn TransientStore>,
        options: PipelineOptions,
    ) -> Self {
        log::debug!(
            "[PIPELINE] backend={}, storage={}, timeout={:?}",
            ocr_service.backend_name(),
            transient_store.storage_kind(),
            options.ocr_timeout
        );

        Self {
            ocr_service,
            transient_store,
            options,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.ocr_service.backend_name()
    }

    pub fn storage_kind(&self) -> &'static str {
        self.transient_store.storage_kind()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.options.max_upload_bytes
    }

    /// Persists an image for a later [`OcrPipeline::extract`] call.
    pub async fn ingest(&self, image: &UploadedImage) -> Result<ImageReference, PipelineError> {
        log::debug!("[PIPELINE] Storing {:?}", image);
        let reference = self.transient_store.store(image).await?;
        log::info!("[PIPELINE] Stored {} as {}", image.file_name, reference);
        Ok(reference)
    }

    /// Runs OCR on an image held only in memory; nothing is persisted.
    pub async fn recognize(
        &self,
        image: &UploadedImage,
    ) -> Result<ExtractionOutcome, PipelineError> {
        self.run_ocr(image).await
    }

    /// Consumes a reference issued by [`OcrPipeline::ingest`].
    pub async fn extract(
        &self,
        reference: &ImageReference,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let claim = self.transient_store.claim(reference).await?;
        log::debug!("[PIPELINE] Claimed {} ({} bytes)", reference, claim.bytes.len());

        let image = match UploadedImage::build_from_bytes(
            claim.bytes.clone(),
            None,
            None,
            self.options.max_upload_bytes,
            global_constants::ERROR_FILE_NOT_FOUND,
        ) {
            Ok(image) => image,
            Err(error) => {
                self.finish_consumed(claim).await;
                return Err(error);
            }
        };

        match self.run_ocr(&image).await {
            Ok(outcome) => {
                self.finish_consumed(claim).await;
                Ok(outcome)
            }
            Err(error) => Err(self.finish_failed(claim, error).await),
        }
    }

    async fn run_ocr(&self, image: &UploadedImage) -> Result<ExtractionOutcome, PipelineError> {
        log::debug!(
            "[PIPELINE] Requesting OCR from {} for {}",
            self.ocr_service.backend_name(),
            image.file_name
        );

        let result = tokio::time::timeout(
            self.options.ocr_timeout,
            self.ocr_service.extract_text_from_image(image),
        )
        .await;

        match result {
            Ok(Ok(ocr_result)) => {
                let outcome = ExtractionOutcome::from(ocr_result);
                match &outcome {
                    ExtractionOutcome::TextDetected(text) => log::info!(
                        "[PIPELINE] OCR succeeded with {} characters",
                        text.chars().count()
                    ),
                    ExtractionOutcome::NoTextDetected => {
                        log::info!("[PIPELINE] OCR finished: no text detected")
                    }
                }
                Ok(outcome)
            }
            Ok(Err(error)) => {
                log::error!("[PIPELINE] OCR backend failed: {:#}", error);
                Err(PipelineError::backend_unavailable(
                    global_constants::ERROR_OCR_FAILED,
                    format!("{:#}", error),
                ))
            }
            Err(_) => {
                log::error!(
                    "[PIPELINE] OCR backend timed out after {:?}",
                    self.options.ocr_timeout
                );
                Err(PipelineError::backend_unavailable(
                    global_constants::ERROR_OCR_TIMEOUT,
                    format!("no response within {:?}", self.options.ocr_timeout),
                ))
            }
        }
    }

    /// Deletes a consumed artifact. Failure here never changes the response.
    async fn finish_consumed(&self, claim: ClaimedImage) {
        let reference = claim.reference.clone();
        match self.transient_store.discard(claim).await {
            Ok(()) => log::debug!("[PIPELINE] Cleaned up {}", reference),
            Err(error) => log::warn!("[PIPELINE] Failed to clean up {}: {:#}", reference, error),
        }
    }

    async fn finish_failed(&self, claim: ClaimedImage, error: PipelineError) -> PipelineError {
        if !self.options.retain_on_backend_failure {
            self.finish_consumed(claim).await;
            return error.with_note(global_constants::DETAILS_RETRY_REQUIRES_UPLOAD);
        }

        let reference = claim.reference.clone();
        match self.transient_store.release(claim).await {
            Ok(()) => {
                log::info!("[PIPELINE] Kept {} for retry", reference);
                error.with_note(global_constants::DETAILS_RETRY_WITH_SAME_REFERENCE)
            }
            Err(release_error) => {
                log::warn!(
                    "[PIPELINE] Failed to keep {} for retry: {:#}",
                    reference,
                    release_error
                );
                error.with_note(global_constants::DETAILS_RETRY_REQUIRES_UPLOAD)
            }
        }
    }
}
