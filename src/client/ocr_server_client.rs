use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::client::{ClientError, EncodedImage, TransportEncoding};
use crate::core::models::ImageReference;
use crate::global_constants;
use crate::presentation::response_envelope::{
    ErrorResponse, FilePathResponse, TextResponse, UploadResponse,
};
use crate::presentation::HealthResponse;

/// Talks to a running OCR server over its JSON API.
pub struct OcrServerClient {
    http: reqwest::Client,
    base_url: String,
}

impl OcrServerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self
            .http
            .get(self.url(global_constants::ROUTE_HEALTH))
            .send()
            .await?;
        decode_response(response).await
    }

    /// `POST /api/upload`; the server decides between `{ text }` and `{ filePath }`.
    pub async fn upload(&self, image: &EncodedImage) -> Result<UploadResponse, ClientError> {
        log::info!("[CLIENT] Uploading {:?} as multipart", image);
        let response = self
            .http
            .post(self.url(global_constants::ROUTE_UPLOAD))
            .multipart(image.to_multipart_form()?)
            .send()
            .await?;
        decode_response(response).await
    }

    pub async fn upload_base64(&self, image: &EncodedImage) -> Result<ImageReference, ClientError> {
        log::info!("[CLIENT] Uploading {:?} as base64", image);
        let response = self
            .http
            .post(self.url(global_constants::ROUTE_UPLOAD_BASE64))
            .json(&image.to_base64_payload())
            .send()
            .await?;
        let stored: FilePathResponse = decode_response(response).await?;
        Ok(stored.file_path)
    }

    pub async fn extract_text(
        &self,
        reference: &ImageReference,
    ) -> Result<TextResponse, ClientError> {
        log::info!("[CLIENT] Extracting text from {}", reference);
        let response = self
            .http
            .post(self.url(global_constants::ROUTE_EXTRACT_TEXT))
            .json(&serde_json::json!({ "filePath": reference }))
            .send()
            .await?;
        decode_response(response).await
    }

    /// Upload followed by extraction when the server hands back a reference.
    pub async fn recognize(
        &self,
        image: &EncodedImage,
        encoding: TransportEncoding,
    ) -> Result<TextResponse, ClientError> {
        let reference = match encoding {
            TransportEncoding::Multipart => match self.upload(image).await? {
                UploadResponse::Text(text) => return Ok(text),
                UploadResponse::Stored(stored) => stored.file_path,
            },
            TransportEncoding::Base64 => self.upload_base64(image).await?,
        };

        self.extract_text(&reference).await
    }
}

async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|error| {
            ClientError::UnexpectedResponse(format!("{}: {}", error, body))
        });
    }

    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(envelope) => Err(ClientError::Server {
            status: status.as_u16(),
            message: envelope.error,
            details: envelope.details,
        }),
        Err(_) => Err(ClientError::UnexpectedResponse(format!("{}: {}", status, body))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::OcrServerApp;
    use crate::core::interfaces::adapters::OcrService;
    use crate::core::models::{OcrResult, UploadedImage};
    use crate::server_settings::{PipelineMode, ServerSettings, StorageMode};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    struct DimensionsOcrService;

    #[async_trait]
    impl OcrService for DimensionsOcrService {
        fn backend_name(&self) -> &'static str {
            "dimensions"
        }

        async fn extract_text_from_image(&self, image: &UploadedImage) -> anyhow::Result<OcrResult> {
            if image.width == 1 && image.height == 1 {
                return Ok(OcrResult::default());
            }
            Ok(OcrResult::from_full_text(format!(
                "HELLO {}x{}",
                image.width, image.height
            )))
        }
    }

    struct RunningServer {
        client: OcrServerClient,
        shutdown: oneshot::Sender<()>,
        server: tokio::task::JoinHandle<anyhow::Result<()>>,
    }

    impl RunningServer {
        async fn start(settings: ServerSettings) -> Self {
            let app = OcrServerApp::build_with_ocr_service(settings, Arc::new(DimensionsOcrService))
                .await
                .unwrap();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap();
            let (shutdown, signal) = oneshot::channel::<()>();
            let server = tokio::spawn(app.serve(listener, async {
                signal.await.ok();
            }));

            let client =
                OcrServerClient::new(&format!("http://{}", address), Duration::from_secs(10)).unwrap();
            Self {
                client,
                shutdown,
                server,
            }
        }

        async fn stop(self) {
            let RunningServer {
                client,
                shutdown,
                server,
            } = self;
            drop(client);
            shutdown.send(()).ok();
            server.await.unwrap().unwrap();
        }
    }

    fn png_image(width: u32, height: u32) -> EncodedImage {
        let pixels = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(pixels)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        EncodedImage::from_bytes(bytes, Some("hello.png")).unwrap()
    }

    fn two_call_disk_settings(directory: &Path) -> ServerSettings {
        ServerSettings {
            storage_mode: StorageMode::Disk,
            pipeline_mode: PipelineMode::TwoCall,
            transient_dir: directory.to_path_buf(),
            ..ServerSettings::default()
        }
    }

    fn file_count(directory: &Path) -> usize {
        std::fs::read_dir(directory).unwrap().count()
    }

    #[tokio::test]
    async fn test_multipart_and_base64_round_trips_agree() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = RunningServer::start(two_call_disk_settings(temp_dir.path())).await;
        let image = png_image(50, 50);

        let via_multipart = server
            .client
            .recognize(&image, TransportEncoding::Multipart)
            .await
            .unwrap();
        let via_base64 = server
            .client
            .recognize(&image, TransportEncoding::Base64)
            .await
            .unwrap();

        assert_eq!(via_multipart.text, "HELLO 50x50");
        assert_eq!(via_base64, via_multipart);
        assert_eq!(file_count(temp_dir.path()), 0);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_two_call_upload_returns_consumable_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = RunningServer::start(two_call_disk_settings(temp_dir.path())).await;

        let uploaded = server.client.upload(&png_image(20, 10)).await.unwrap();
        let UploadResponse::Stored(stored) = uploaded else {
            panic!("expected a stored reference, got {:?}", uploaded);
        };
        assert!(Path::new(stored.file_path.as_str()).exists());

        let text = server.client.extract_text(&stored.file_path).await.unwrap();
        assert_eq!(text.text, "HELLO 20x10");
        assert!(!Path::new(stored.file_path.as_str()).exists());

        let again = server.client.extract_text(&stored.file_path).await.unwrap_err();
        assert!(matches!(again, ClientError::Server { status: 400, .. }));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_single_call_upload_returns_text_directly() {
        let settings = ServerSettings {
            storage_mode: StorageMode::Memory,
            pipeline_mode: PipelineMode::SingleCall,
            ..ServerSettings::default()
        };
        let server = RunningServer::start(settings).await;

        let uploaded = server.client.upload(&png_image(50, 50)).await.unwrap();

        assert_eq!(
            uploaded,
            UploadResponse::Text(TextResponse {
                text: "HELLO 50x50".to_string(),
                no_text_detected: false,
            })
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_no_text_detected_reaches_client() {
        let settings = ServerSettings {
            storage_mode: StorageMode::Memory,
            ..ServerSettings::default()
        };
        let server = RunningServer::start(settings).await;

        let text = server
            .client
            .recognize(&png_image(1, 1), TransportEncoding::Multipart)
            .await
            .unwrap();

        assert!(text.no_text_detected);
        assert!(text.text.is_empty());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_server_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = std::fs::canonicalize(temp_dir.path()).unwrap();
        let server = RunningServer::start(two_call_disk_settings(&directory)).await;
        let missing = ImageReference::new(directory.join("gone.png").to_string_lossy());

        let error = server.client.extract_text(&missing).await.unwrap_err();

        match error {
            ClientError::Server { status, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, global_constants::ERROR_FILE_NOT_FOUND);
            }
            other => panic!("expected a server error, got {:?}", other),
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let settings = ServerSettings {
            storage_mode: StorageMode::Memory,
            ..ServerSettings::default()
        };
        let server = RunningServer::start(settings).await;

        let health = server.client.health().await.unwrap();

        assert_eq!(health.status, "ok");
        assert_eq!(health.backend, "dimensions");
        assert_eq!(health.pipeline_mode, PipelineMode::SingleCall);

        server.stop().await;
    }
}
