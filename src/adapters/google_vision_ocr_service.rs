use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::core::interfaces::adapters::OcrService;
use crate::core::models::{BoundingBox, DetectedText, OcrResult, UploadedImage};
use crate::server_settings::ServerSettings;

const TEXT_DETECTION_FEATURE: &str = "TEXT_DETECTION";

#[derive(Clone, PartialEq, Eq)]
pub enum VisionCredential {
    ApiKey(String),
    AccessToken(String),
}

impl std::fmt::Debug for VisionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisionCredential::ApiKey(_) => write!(f, "ApiKey(***)"),
            VisionCredential::AccessToken(_) => write!(f, "AccessToken(***)"),
        }
    }
}

#[derive(Deserialize)]
struct CredentialFile {
    api_key: Option<String>,
    access_token: Option<String>,
}

impl VisionCredential {
    /// An explicit API key wins; otherwise the credential file must hold an
    /// `api_key` or an `access_token`.
    pub fn resolve(api_key: Option<&str>, credentials_path: Option<&Path>) -> Result<Self> {
        if let Some(key) = api_key.map(str::trim).filter(|key| !key.is_empty()) {
            return Ok(VisionCredential::ApiKey(key.to_string()));
        }

        let path = credentials_path.context(
            "Google Vision needs GOOGLE_VISION_API_KEY or GOOGLE_APPLICATION_CREDENTIALS",
        )?;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credential file {:?}", path))?;
        let file: CredentialFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credential file {:?}", path))?;

        let non_blank = |value: Option<String>| value.filter(|value| !value.trim().is_empty());

        if let Some(key) = non_blank(file.api_key) {
            return Ok(VisionCredential::ApiKey(key));
        }
        if let Some(token) = non_blank(file.access_token) {
            return Ok(VisionCredential::AccessToken(token));
        }

        anyhow::bail!(
            "Credential file {:?} has neither api_key nor access_token",
            path
        )
    }
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Serialize)]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

#[derive(Deserialize)]
struct Vertex {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// OCR through the Google Cloud Vision `images:annotate` REST endpoint.
pub struct GoogleVisionOcrService {
    client: reqwest::Client,
    endpoint: String,
    credential: VisionCredential,
}

impl GoogleVisionOcrService {
    pub fn build(settings: &ServerSettings) -> Result<Self> {
        let credential = VisionCredential::resolve(
            settings.google_vision_api_key.as_deref(),
            settings.google_credentials_path.as_deref(),
        )?;

        Self::with_credential(
            &settings.google_vision_endpoint,
            credential,
            settings.ocr_timeout(),
        )
    }

    pub fn with_credential(
        endpoint: &str,
        credential: VisionCredential,
        timeout: Duration,
    ) -> Result<Self> {
        log::info!("[VISION_OCR] Initializing Google Vision OCR service at {}", endpoint);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn annotate_url(&self) -> String {
        let base = format!("{}/v1/images:annotate", self.endpoint);
        match &self.credential {
            VisionCredential::ApiKey(key) => format!("{}?key={}", base, urlencoding::encode(key)),
            VisionCredential::AccessToken(_) => base,
        }
    }

    fn build_request(image: &UploadedImage) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: base64::engine::general_purpose::STANDARD.encode(image.bytes()),
                },
                features: vec![Feature {
                    kind: TEXT_DETECTION_FEATURE,
                }],
            }],
        }
    }

    /// The first annotation is the whole text; the rest are individual words.
    fn into_ocr_result(response: AnnotateImageResponse) -> Result<OcrResult> {
        if let Some(error) = response.error {
            anyhow::bail!("Vision API error {}: {}", error.code, error.message);
        }

        let mut annotations = response.text_annotations.into_iter();
        let full_text = match annotations.next() {
            Some(first) => first.description,
            None => return Ok(OcrResult::default()),
        };

        let text_blocks = annotations
            .map(|annotation| {
                let vertices: Vec<(f32, f32)> = annotation
                    .bounding_poly
                    .map(|poly| poly.vertices.iter().map(|v| (v.x, v.y)).collect())
                    .unwrap_or_default();
                DetectedText::new(annotation.description, BoundingBox::enclosing(&vertices))
            })
            .collect();

        Ok(OcrResult {
            text_blocks,
            full_text,
        })
    }
}

#[async_trait]
impl OcrService for GoogleVisionOcrService {
    fn backend_name(&self) -> &'static str {
        "google-vision"
    }

    async fn extract_text_from_image(&self, image: &UploadedImage) -> Result<OcrResult> {
        log::info!(
            "[VISION_OCR] Starting text extraction for {} ({} bytes)",
            image.file_name,
            image.size()
        );

        let mut request = self
            .client
            .post(self.annotate_url())
            .json(&Self::build_request(image));
        if let VisionCredential::AccessToken(token) = &self.credential {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach Google Vision API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Google Vision response")?;

        if !status.is_success() {
            anyhow::bail!("Google Vision API returned {}: {}", status, body);
        }

        let parsed: AnnotateResponse =
            serde_json::from_str(&body).context("Failed to parse Google Vision response")?;
        let first = parsed.responses.into_iter().next().unwrap_or_default();
        let result = Self::into_ocr_result(first)?;

        log::info!(
            "[VISION_OCR] Text extraction complete. {} characters, {} words",
            result.full_text.len(),
            result.text_blocks.len()
        );
        log::debug!("[VISION_OCR] Extracted text: {}", result.full_text);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::RawQuery;
    use axum::http::{HeaderMap, StatusCode};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    fn png_image() -> UploadedImage {
        let pixels = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(pixels)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        UploadedImage::build_from_bytes(bytes, None, None, 1024, "empty").unwrap()
    }

    fn parse(json: &str) -> AnnotateImageResponse {
        let response: AnnotateResponse = serde_json::from_str(json).unwrap();
        response.responses.into_iter().next().unwrap_or_default()
    }

    #[derive(Clone, Default)]
    struct Captured {
        query: Arc<Mutex<Option<String>>>,
        authorization: Arc<Mutex<Option<String>>>,
        body: Arc<Mutex<Option<serde_json::Value>>>,
    }

    async fn spawn_mock_vision(status: StatusCode, reply: serde_json::Value) -> (String, Captured) {
        let captured = Captured::default();
        let state = captured.clone();

        let app = Router::new().fallback(
            move |RawQuery(query): RawQuery, headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let state = state.clone();
                let reply = reply.clone();
                async move {
                    *state.query.lock().unwrap() = query;
                    *state.authorization.lock().unwrap() = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    *state.body.lock().unwrap() = Some(body);
                    (status, Json(reply))
                }
            },
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", address), captured)
    }

    #[test]
    fn test_into_ocr_result_uses_first_annotation_as_full_text() {
        let response = parse(
            r#"{"responses":[{"textAnnotations":[
                {"description":"HELLO\n","boundingPoly":{"vertices":[{"x":1,"y":2},{"x":40,"y":2},{"x":40,"y":12},{"y":12}]}},
                {"description":"HELLO","boundingPoly":{"vertices":[{"x":1,"y":2},{"x":40,"y":2},{"x":40,"y":12},{"x":1,"y":12}]}}
            ]}]}"#,
        );

        let result = GoogleVisionOcrService::into_ocr_result(response).unwrap();

        assert_eq!(result.full_text, "HELLO\n");
        assert_eq!(result.text_blocks.len(), 1);
        let bounds = result.text_blocks[0].bounds.unwrap();
        assert_eq!((bounds.x, bounds.y, bounds.width, bounds.height), (1.0, 2.0, 39.0, 10.0));
    }

    #[test]
    fn test_into_ocr_result_without_annotations_has_no_text() {
        let result = GoogleVisionOcrService::into_ocr_result(parse(r#"{"responses":[{}]}"#)).unwrap();
        assert!(!result.has_text());

        let empty = GoogleVisionOcrService::into_ocr_result(parse(r#"{"responses":[]}"#)).unwrap();
        assert!(!empty.has_text());
    }

    #[test]
    fn test_into_ocr_result_surfaces_per_image_error() {
        let response = parse(r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#);

        let error = GoogleVisionOcrService::into_ocr_result(response).unwrap_err();

        assert!(error.to_string().contains("Bad image data."));
    }

    #[test]
    fn test_resolve_prefers_explicit_api_key() {
        let credential = VisionCredential::resolve(Some("abc"), None).unwrap();
        assert_eq!(credential, VisionCredential::ApiKey("abc".to_string()));
    }

    #[test]
    fn test_resolve_reads_credential_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let key_path = temp_dir.path().join("key.json");
        std::fs::write(&key_path, r#"{"api_key":"from-file"}"#).unwrap();
        let token_path = temp_dir.path().join("token.json");
        std::fs::write(&token_path, r#"{"access_token":"ya29.token"}"#).unwrap();

        assert_eq!(
            VisionCredential::resolve(None, Some(&key_path)).unwrap(),
            VisionCredential::ApiKey("from-file".to_string())
        );
        assert_eq!(
            VisionCredential::resolve(Some("  "), Some(&token_path)).unwrap(),
            VisionCredential::AccessToken("ya29.token".to_string())
        );
    }

    #[test]
    fn test_resolve_fails_without_any_credential() {
        assert!(VisionCredential::resolve(None, None).is_err());

        let temp_dir = tempfile::tempdir().unwrap();
        let empty_path = temp_dir.path().join("empty.json");
        std::fs::write(&empty_path, "{}").unwrap();
        assert!(VisionCredential::resolve(None, Some(&empty_path)).is_err());
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let debug = format!("{:?}", VisionCredential::ApiKey("super-secret".to_string()));
        assert!(!debug.contains("super-secret"));
    }

    #[tokio::test]
    async fn test_extract_text_sends_api_key_and_base64_image() {
        let (endpoint, captured) = spawn_mock_vision(
            StatusCode::OK,
            serde_json::json!({"responses":[{"textAnnotations":[{"description":"HELLO"}]}]}),
        )
        .await;
        let service = GoogleVisionOcrService::with_credential(
            &endpoint,
            VisionCredential::ApiKey("k&y".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let image = png_image();

        let result = service.extract_text_from_image(&image).await.unwrap();

        assert_eq!(result.full_text, "HELLO");
        assert_eq!(captured.query.lock().unwrap().as_deref(), Some("key=k%26y"));
        let body = captured.body.lock().unwrap().clone().unwrap();
        let content = body["requests"][0]["image"]["content"].as_str().unwrap();
        assert_eq!(
            base64::engine::general_purpose::STANDARD.decode(content).unwrap(),
            image.bytes()
        );
        assert_eq!(body["requests"][0]["features"][0]["type"], "TEXT_DETECTION");
    }

    #[tokio::test]
    async fn test_extract_text_uses_bearer_token() {
        let (endpoint, captured) = spawn_mock_vision(
            StatusCode::OK,
            serde_json::json!({"responses":[{}]}),
        )
        .await;
        let service = GoogleVisionOcrService::with_credential(
            &endpoint,
            VisionCredential::AccessToken("token-123".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let result = service.extract_text_from_image(&png_image()).await.unwrap();

        assert!(!result.has_text());
        assert_eq!(captured.query.lock().unwrap().as_deref(), None);
        assert_eq!(
            captured.authorization.lock().unwrap().as_deref(),
            Some("Bearer token-123")
        );
    }

    #[tokio::test]
    async fn test_extract_text_fails_on_http_error_status() {
        let (endpoint, _captured) = spawn_mock_vision(
            StatusCode::FORBIDDEN,
            serde_json::json!({"error":{"code":403,"message":"quota exceeded"}}),
        )
        .await;
        let service = GoogleVisionOcrService::with_credential(
            &endpoint,
            VisionCredential::ApiKey("key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let error = service
            .extract_text_from_image(&png_image())
            .await
            .unwrap_err();

        assert!(error.to_string().contains("403"));
        assert!(error.to_string().contains("quota exceeded"));
    }
}
