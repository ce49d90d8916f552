use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::core::interfaces::adapters::{ClaimedImage, TransientStore};
use crate::core::models::{ImageFormat, ImageReference, PipelineError, UploadedImage};
use crate::global_constants;

/// Keeps uploads as files directly inside one transient directory.
///
/// References are absolute paths. A client-supplied path is only honoured
/// when it canonicalizes to a regular file whose parent is that directory.
pub struct DiskTransientStore {
    directory: PathBuf,
}

impl DiskTransientStore {
    pub async fn initialize(directory: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(directory)
            .await
            .with_context(|| format!("Failed to create transient directory {:?}", directory))?;

        let directory = tokio::fs::canonicalize(directory)
            .await
            .with_context(|| format!("Failed to resolve transient directory {:?}", directory))?;

        log::info!("[DISK_STORE] Using transient directory {:?}", directory);
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn unique_file_name(format: ImageFormat) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();

        format!(
            "{}-{}.{}",
            millis,
            Uuid::new_v4().simple(),
            format.file_extension()
        )
    }

    fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut raw = path.as_os_str().to_os_string();
        raw.push(suffix);
        PathBuf::from(raw)
    }

    async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn resolve(&self, reference: &ImageReference) -> Result<PathBuf, PipelineError> {
        let candidate = PathBuf::from(reference.as_str());
        if !candidate.is_absolute() || reference.memory_token().is_some() {
            return Err(PipelineError::validation(global_constants::ERROR_INVALID_FILE_PATH));
        }

        let canonical = match tokio::fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                let message = if candidate.parent() == Some(self.directory.as_path()) {
                    global_constants::ERROR_FILE_NOT_FOUND
                } else {
                    global_constants::ERROR_INVALID_FILE_PATH
                };
                return Err(PipelineError::validation(message));
            }
            Err(error) => {
                return Err(PipelineError::validation_with_details(
                    global_constants::ERROR_INVALID_FILE_PATH,
                    error,
                ))
            }
        };

        if canonical.parent() != Some(self.directory.as_path()) {
            log::warn!(
                "[DISK_STORE] Rejected reference outside transient directory: {:?}",
                canonical
            );
            return Err(PipelineError::validation(global_constants::ERROR_INVALID_FILE_PATH));
        }

        let file_name = canonical
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if file_name.ends_with(global_constants::PARTIAL_FILE_SUFFIX)
            || file_name.ends_with(global_constants::CLAIMED_FILE_SUFFIX)
        {
            return Err(PipelineError::validation(global_constants::ERROR_FILE_NOT_FOUND));
        }

        let metadata = tokio::fs::metadata(&canonical)
            .await
            .map_err(|error| {
                PipelineError::validation_with_details(
                    global_constants::ERROR_FILE_NOT_FOUND,
                    error,
                )
            })?;
        if !metadata.is_file() {
            return Err(PipelineError::validation(global_constants::ERROR_INVALID_FILE_PATH));
        }

        Ok(canonical)
    }
}

#[async_trait]
impl TransientStore for DiskTransientStore {
    fn storage_kind(&self) -> &'static str {
        "disk"
    }

    async fn store(&self, image: &UploadedImage) -> Result<ImageReference, PipelineError> {
        let final_path = self.directory.join(Self::unique_file_name(image.format));
        let partial_path = Self::with_suffix(&final_path, global_constants::PARTIAL_FILE_SUFFIX);

        log::debug!(
            "[DISK_STORE] Writing {} bytes to {:?}",
            image.size(),
            partial_path
        );

        let written = match Self::write_file(&partial_path, image.bytes()).await {
            Ok(()) => tokio::fs::rename(&partial_path, &final_path).await,
            Err(error) => Err(error),
        };

        if let Err(error) = written {
            log::error!("[DISK_STORE] Failed to store {:?}: {}", final_path, error);
            if let Err(cleanup_error) = tokio::fs::remove_file(&partial_path).await {
                if cleanup_error.kind() != ErrorKind::NotFound {
                    log::warn!(
                        "[DISK_STORE] Failed to remove partial file {:?}: {}",
                        partial_path,
                        cleanup_error
                    );
                }
            }
            return Err(PipelineError::storage(global_constants::ERROR_STORAGE_FAILED, error));
        }

        log::info!("[DISK_STORE] Stored {} as {:?}", image.file_name, final_path);
        Ok(ImageReference::new(final_path.to_string_lossy()))
    }

    async fn claim(&self, reference: &ImageReference) -> Result<ClaimedImage, PipelineError> {
        let path = self.resolve(reference).await?;
        let claimed_path = Self::with_suffix(&path, global_constants::CLAIMED_FILE_SUFFIX);

        match tokio::fs::rename(&path, &claimed_path).await {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::validation(global_constants::ERROR_FILE_NOT_FOUND));
            }
            Err(error) => {
                return Err(PipelineError::storage(global_constants::ERROR_STORAGE_FAILED, error));
            }
        }

        let read = async {
            let bytes = tokio::fs::read(&claimed_path).await?;
            let stored_at = tokio::fs::metadata(&claimed_path).await?.modified()?;
            Ok::<_, std::io::Error>((bytes, stored_at))
        };

        match read.await {
            Ok((bytes, stored_at)) => {
                log::debug!("[DISK_STORE] Claimed {:?} ({} bytes)", path, bytes.len());
                Ok(ClaimedImage {
                    reference: reference.clone(),
                    bytes,
                    stored_at,
                    claimed_path: Some(claimed_path),
                })
            }
            Err(error) => {
                log::error!("[DISK_STORE] Failed to read {:?}: {}", claimed_path, error);
                if let Err(restore_error) = tokio::fs::rename(&claimed_path, &path).await {
                    log::warn!(
                        "[DISK_STORE] Failed to restore {:?}: {}",
                        path,
                        restore_error
                    );
                }
                Err(PipelineError::storage(global_constants::ERROR_STORAGE_FAILED, error))
            }
        }
    }

    async fn discard(&self, claim: ClaimedImage) -> Result<()> {
        let claimed_path = claim
            .claimed_path
            .context("Claimed image has no backing file")?;

        tokio::fs::remove_file(&claimed_path)
            .await
            .with_context(|| format!("Failed to delete {:?}", claimed_path))?;

        log::debug!("[DISK_STORE] Deleted {:?}", claimed_path);
        Ok(())
    }

    async fn release(&self, claim: ClaimedImage) -> Result<()> {
        let claimed_path = claim
            .claimed_path
            .context("Claimed image has no backing file")?;

        let original = claimed_path
            .to_str()
            .and_then(|raw| raw.strip_suffix(global_constants::CLAIMED_FILE_SUFFIX))
            .map(PathBuf::from)
            .context("Claimed file has an unexpected name")?;

        tokio::fs::rename(&claimed_path, &original)
            .await
            .with_context(|| format!("Failed to restore {:?}", original))?;

        log::debug!("[DISK_STORE] Released {:?} for retry", original);
        Ok(())
    }

    async fn sweep_expired(&self, max_age: Duration) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .with_context(|| format!("Failed to list {:?}", self.directory))?;

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(error) => {
                    log::warn!("[DISK_STORE] Failed to inspect {:?}: {}", path, error);
                    continue;
                }
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age < max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    log::debug!("[DISK_STORE] Swept expired file {:?}", path);
                    removed += 1;
                }
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => log::warn!("[DISK_STORE] Failed to sweep {:?}: {}", path, error),
            }
        }

        Ok(removed)
    }
}
