use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;

use crate::adapters::{
    DiskTransientStore, GoogleVisionOcrService, MemoryTransientStore, TesseractOcrService,
};
use crate::core::interfaces::adapters::{OcrService, TransientStore};
use crate::core::orchestrators::ocr_pipeline::{OcrPipeline, PipelineOptions};
use crate::infrastructure::spawn_transient_sweeper;
use crate::presentation::{build_router, AppState};
use crate::server_settings::{OcrBackend, ServerSettings, StorageMode};

/// The wired server: settings, the store chosen by `STORAGE_MODE`, and the
/// router over a pipeline using the backend chosen by `OCR_BACKEND`.
pub struct OcrServerApp {
    settings: ServerSettings,
    transient_store: Arc<dyn TransientStore>,
    router: Router,
}

impl OcrServerApp {
    pub async fn build(settings: ServerSettings) -> Result<Self> {
        log::info!("[APP] Initializing OCR server");
        let ocr_service = build_ocr_service(&settings)?;
        Self::build_with_ocr_service(settings, ocr_service).await
    }

    /// Same as [`OcrServerApp::build`] with a caller-supplied OCR backend.
    pub async fn build_with_ocr_service(
        settings: ServerSettings,
        ocr_service: Arc<dyn OcrService>,
    ) -> Result<Self> {
        let transient_store = build_transient_store(&settings).await?;

        let pipeline = OcrPipeline::build(
            ocr_service,
            transient_store.clone(),
            PipelineOptions {
                ocr_timeout: settings.ocr_timeout(),
                retain_on_backend_failure: settings.retain_on_backend_failure,
                max_upload_bytes: settings.max_upload_bytes,
            },
        );

        let state = AppState {
            pipeline: Arc::new(pipeline),
            pipeline_mode: settings.pipeline_mode,
        };
        let router = build_router(state, settings.request_body_limit());

        Ok(Self {
            settings,
            transient_store,
            router,
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let address = self.settings.socket_address()?;
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;

        self.serve(listener, shutdown_signal()).await
    }

    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_address = listener
            .local_addr()
            .context("Failed to read listener address")?;
        log::info!("[APP] Listening on http://{}", local_address);

        let sweeper = spawn_transient_sweeper(
            self.transient_store.clone(),
            self.settings.sweep_interval(),
            self.settings.transient_ttl(),
        );

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed");

        sweeper.abort();
        log::info!("[APP] Server shutdown complete");
        served
    }
}

fn build_ocr_service(settings: &ServerSettings) -> Result<Arc<dyn OcrService>> {
    match settings.ocr_backend {
        OcrBackend::GoogleVision => {
            let service = GoogleVisionOcrService::build(settings)
                .context("Failed to initialize Google Vision OCR service")?;
            Ok(Arc::new(service))
        }
        OcrBackend::Tesseract => {
            let service =
                TesseractOcrService::build(&settings.tesseract_language, settings.tesseract_psm)
                    .context("Failed to initialize Tesseract OCR service")?;
            Ok(Arc::new(service))
        }
    }
}

async fn build_transient_store(settings: &ServerSettings) -> Result<Arc<dyn TransientStore>> {
    match settings.storage_mode {
        StorageMode::Disk => {
            let store = DiskTransientStore::initialize(&settings.transient_dir).await?;
            Ok(Arc::new(store))
        }
        StorageMode::Memory => Ok(Arc::new(MemoryTransientStore::new())),
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("[APP] Shutdown signal received"),
        Err(error) => {
            log::error!("[APP] Failed to listen for Ctrl-C: {}", error);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{OcrResult, UploadedImage};
    use crate::global_constants;
    use crate::server_settings::PipelineMode;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct FixedOcrService;

    #[async_trait]
    impl OcrService for FixedOcrService {
        fn backend_name(&self) -> &'static str {
            "fixed"
        }

        async fn extract_text_from_image(&self, _image: &UploadedImage) -> Result<OcrResult> {
            Ok(OcrResult::from_full_text("HELLO".to_string()))
        }
    }

    async fn health_of(app: &OcrServerApp) -> serde_json::Value {
        let response = app
            .router()
            .oneshot(
                Request::get(global_constants::ROUTE_HEALTH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_disk_storage_creates_transient_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = ServerSettings {
            transient_dir: temp_dir.path().join("nested").join("uploads"),
            storage_mode: StorageMode::Disk,
            ..ServerSettings::default()
        };

        let app = OcrServerApp::build_with_ocr_service(settings, Arc::new(FixedOcrService))
            .await
            .unwrap();

        assert!(temp_dir.path().join("nested").join("uploads").is_dir());
        let health = health_of(&app).await;
        assert_eq!(health["storage"], "disk");
        assert_eq!(health["backend"], "fixed");
    }

    #[tokio::test]
    async fn test_memory_storage_and_pipeline_mode_are_wired() {
        let settings = ServerSettings {
            storage_mode: StorageMode::Memory,
            pipeline_mode: PipelineMode::TwoCall,
            ..ServerSettings::default()
        };

        let app = OcrServerApp::build_with_ocr_service(settings, Arc::new(FixedOcrService))
            .await
            .unwrap();

        let health = health_of(&app).await;
        assert_eq!(health["storage"], "memory");
        assert_eq!(health["pipelineMode"], "two-call");
    }

    #[tokio::test]
    async fn test_google_vision_without_credentials_fails_startup() {
        let settings = ServerSettings {
            storage_mode: StorageMode::Memory,
            ocr_backend: OcrBackend::GoogleVision,
            google_vision_api_key: None,
            google_credentials_path: None,
            ..ServerSettings::default()
        };

        let error = OcrServerApp::build(settings).await.err().unwrap();

        assert!(format!("{:#}", error).contains("GOOGLE_VISION_API_KEY"));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_signal() {
        let settings = ServerSettings {
            storage_mode: StorageMode::Memory,
            ..ServerSettings::default()
        };
        let app = OcrServerApp::build_with_ocr_service(settings, Arc::new(FixedOcrService))
            .await
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            app.serve(listener, async {}),
        )
        .await
        .unwrap();

        assert!(result.is_ok());
    }
}
