use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use async_trait::async_trait;

use crate::core::models::{ImageReference, PipelineError, UploadedImage};

/// Image bytes taken out of a store for exactly one OCR attempt.
///
/// While claimed, the reference no longer resolves for anyone else. The claim
/// must end with either [`TransientStore::discard`] or
/// [`TransientStore::release`].
#[derive(Debug)]
pub struct ClaimedImage {
    pub reference: ImageReference,
    pub bytes: Vec<u8>,
    pub stored_at: SystemTime,
    pub(crate) claimed_path: Option<PathBuf>,
}

#[async_trait]
pub trait TransientStore: Send + Sync {
    fn storage_kind(&self) -> &'static str;

    async fn store(&self, image: &UploadedImage) -> Result<ImageReference, PipelineError>;

    async fn claim(&self, reference: &ImageReference) -> Result<ClaimedImage, PipelineError>;

    /// Deletes a claimed image for good.
    async fn discard(&self, claim: ClaimedImage) -> Result<()>;

    /// Makes a claimed image resolvable again under its original reference.
    async fn release(&self, claim: ClaimedImage) -> Result<()>;

    /// Removes everything older than `max_age`, returning how many entries went.
    async fn sweep_expired(&self, max_age: Duration) -> Result<usize>;
}
