use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::interfaces::adapters::OcrService;
use crate::core::models::{DetectedText, OcrResult, UploadedImage};

/// Local OCR through the `tesseract` executable.
///
/// The language pack is fixed when the service is built; the image goes in on
/// stdin as PNG and the recognized text comes back on stdout.
pub struct TesseractOcrService {
    executable: PathBuf,
    language: String,
    page_segmentation_mode: Option<u8>,
}

impl TesseractOcrService {
    pub fn build(language: &str, page_segmentation_mode: Option<u8>) -> Result<Self> {
        log::info!("[TESSERACT_OCR] Initializing Tesseract OCR service");

        let executable =
            which::which("tesseract").context("Tesseract executable not found on PATH")?;

        log::info!(
            "[TESSERACT_OCR] Using {:?} with language '{}'",
            executable,
            language
        );
        Ok(Self::with_executable(executable, language, page_segmentation_mode))
    }

    pub fn with_executable(
        executable: PathBuf,
        language: &str,
        page_segmentation_mode: Option<u8>,
    ) -> Self {
        Self {
            executable,
            language: language.to_string(),
            page_segmentation_mode,
        }
    }

    fn command_arguments(&self) -> Vec<String> {
        let mut arguments = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ];
        if let Some(mode) = self.page_segmentation_mode {
            arguments.push("--psm".to_string());
            arguments.push(mode.to_string());
        }
        arguments
    }

    fn convert_to_tesseract_compatible_format(bytes: &[u8]) -> Result<Vec<u8>> {
        log::debug!("[TESSERACT_OCR] Converting image to compatible format");
        let image = image::load_from_memory(bytes).context("Failed to decode image")?;
        let mut buffer = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .context("Failed to convert image to PNG format")?;
        Ok(buffer)
    }

    fn parse_output(stdout: &[u8]) -> OcrResult {
        let full_text = String::from_utf8_lossy(stdout).trim().to_string();
        let text_blocks = full_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| DetectedText::new(line.to_string(), None))
            .collect();

        OcrResult {
            text_blocks,
            full_text,
        }
    }
}

#[async_trait]
impl OcrService for TesseractOcrService {
    fn backend_name(&self) -> &'static str {
        "tesseract"
    }

    async fn extract_text_from_image(&self, image: &UploadedImage) -> Result<OcrResult> {
        log::info!("[TESSERACT_OCR] Starting text extraction");
        log::debug!(
            "[TESSERACT_OCR] Image dimensions: {}x{}",
            image.width,
            image.height
        );

        let bytes = image.bytes().to_vec();
        let png = tokio::task::spawn_blocking(move || {
            Self::convert_to_tesseract_compatible_format(&bytes)
        })
        .await
        .context("Image conversion task failed")?
        .context("Failed to prepare image for OCR")?;

        let mut child = Command::new(&self.executable)
            .args(self.command_arguments())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {:?}", self.executable))?;

        let mut stdin = child.stdin.take().context("Tesseract stdin unavailable")?;
        let feed = async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.context("Failed to wait for tesseract")?;

        // An early exit closes stdin, so stderr explains a broken pipe.
        if !output.status.success() {
            anyhow::bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        fed.context("Failed to send image to tesseract")?;

        let result = Self::parse_output(&output.stdout);

        log::info!(
            "[TESSERACT_OCR] Text extraction complete. Extracted {} characters",
            result.full_text.len()
        );
        log::debug!("[TESSERACT_OCR] Extracted text: {}", result.full_text);

        Ok(result)
    }
}
