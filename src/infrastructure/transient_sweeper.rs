use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::interfaces::adapters::TransientStore;

/// Periodically drops stored images that were never extracted.
///
/// The first sweep runs immediately so leftovers from a previous run are
/// reclaimed at startup. Abort the returned handle to stop sweeping.
pub fn spawn_transient_sweeper(
    store: Arc<dyn TransientStore>,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    log::info!(
        "[SWEEPER] Sweeping {} storage every {:?}, max age {:?}",
        store.storage_kind(),
        interval,
        max_age
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.sweep_expired(max_age).await {
                Ok(0) => log::debug!("[SWEEPER] Nothing expired"),
                Ok(removed) => log::info!("[SWEEPER] Removed {} expired image(s)", removed),
                Err(error) => log::warn!("[SWEEPER] Sweep failed: {:#}", error),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTransientStore;
    use crate::core::models::UploadedImage;

    fn png_image() -> UploadedImage {
        let pixels = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(pixels)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        UploadedImage::build_from_bytes(bytes, None, None, 1024 * 1024, "empty").unwrap()
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_images() {
        let store = Arc::new(MemoryTransientStore::new());
        store.store(&png_image()).await.unwrap();
        assert_eq!(store.len().await, 1);

        let handle = spawn_transient_sweeper(
            store.clone(),
            Duration::from_millis(10),
            Duration::ZERO,
        );

        let mut remaining = store.len().await;
        for _ in 0..100 {
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            remaining = store.len().await;
        }
        handle.abort();

        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_sweeper_keeps_fresh_images() {
        let store = Arc::new(MemoryTransientStore::new());
        store.store(&png_image()).await.unwrap();

        let handle = spawn_transient_sweeper(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(store.len().await, 1);
    }
}
