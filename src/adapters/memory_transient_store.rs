use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::interfaces::adapters::{ClaimedImage, TransientStore};
use crate::core::models::{ImageReference, PipelineError, UploadedImage};
use crate::global_constants;

struct StoredImage {
    bytes: Vec<u8>,
    stored_at: SystemTime,
}

/// Keeps uploads in process memory under `memory://<uuid>` references.
#[derive(Default)]
pub struct MemoryTransientStore {
    entries: Mutex<HashMap<String, StoredImage>>,
}

impl MemoryTransientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl TransientStore for MemoryTransientStore {
    fn storage_kind(&self) -> &'static str {
        "memory"
    }

    async fn store(&self, image: &UploadedImage) -> Result<ImageReference, PipelineError> {
        let token = Uuid::new_v4().simple().to_string();

        self.entries.lock().await.insert(
            token.clone(),
            StoredImage {
                bytes: image.bytes().to_vec(),
                stored_at: SystemTime::now(),
            },
        );

        log::info!(
            "[MEMORY_STORE] Stored {} ({} bytes) as {}",
            image.file_name,
            image.size(),
            token
        );
        Ok(ImageReference::new(format!(
            "{}{}",
            global_constants::MEMORY_REFERENCE_PREFIX,
            token
        )))
    }

    async fn claim(&self, reference: &ImageReference) -> Result<ClaimedImage, PipelineError> {
        let token = reference.memory_token().ok_or_else(|| {
            PipelineError::validation(global_constants::ERROR_INVALID_FILE_PATH)
        })?;

        let stored = self
            .entries
            .lock()
            .await
            .remove(token)
            .ok_or_else(|| PipelineError::validation(global_constants::ERROR_FILE_NOT_FOUND))?;

        log::debug!("[MEMORY_STORE] Claimed {}", token);
        Ok(ClaimedImage {
            reference: reference.clone(),
            bytes: stored.bytes,
            stored_at: stored.stored_at,
            claimed_path: None,
        })
    }

    async fn discard(&self, claim: ClaimedImage) -> Result<()> {
        log::debug!("[MEMORY_STORE] Dropped {}", claim.reference);
        Ok(())
    }

    async fn release(&self, claim: ClaimedImage) -> Result<()> {
        let token = claim
            .reference
            .memory_token()
            .ok_or_else(|| anyhow::anyhow!("Not a memory reference: {}", claim.reference))?
            .to_string();

        self.entries.lock().await.insert(
            token,
            StoredImage {
                bytes: claim.bytes,
                stored_at: claim.stored_at,
            },
        );

        log::debug!("[MEMORY_STORE] Released {} for retry", claim.reference);
        Ok(())
    }

    async fn sweep_expired(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();

        entries.retain(|_, stored| {
            now.duration_since(stored.stored_at).unwrap_or_default() < max_age
        });

        Ok(before - entries.len())
    }
}
