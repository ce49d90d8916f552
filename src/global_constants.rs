pub const APPLICATION_NAME: &str = "image-ocr-server";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_OCR_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_TRANSIENT_TTL_SECONDS: u64 = 900;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_TESSERACT_LANGUAGE: &str = "eng";
pub const DEFAULT_GOOGLE_VISION_ENDPOINT: &str = "https://vision.googleapis.com";
pub const TRANSIENT_DIR_NAME: &str = "uploads";

/// Slack for multipart framing, JSON keys and data URL prefixes.
pub const REQUEST_BODY_OVERHEAD_BYTES: usize = 64 * 1024;
/// Narrowest line width a wrapping base64 encoder uses (PEM). MIME wraps at 76.
pub const BASE64_MIN_LINE_WIDTH: usize = 64;
/// A CRLF line break escaped inside a JSON string (`\r\n`).
pub const JSON_ESCAPED_LINE_BREAK_BYTES: usize = 4;

pub const IMAGE_FIELD_NAME: &str = "image";
pub const DEFAULT_UPLOAD_FILE_NAME: &str = "upload";
pub const MEMORY_REFERENCE_PREFIX: &str = "memory://";
pub const PARTIAL_FILE_SUFFIX: &str = ".part";
pub const CLAIMED_FILE_SUFFIX: &str = ".claimed";

pub const ROUTE_UPLOAD: &str = "/api/upload";
pub const ROUTE_UPLOAD_BASE64: &str = "/api/upload-base64";
pub const ROUTE_EXTRACT_TEXT: &str = "/api/extract-text";
pub const ROUTE_HEALTH: &str = "/api/health";

pub const ERROR_NO_FILE_UPLOADED: &str = "No file uploaded";
pub const ERROR_NO_IMAGE_DATA: &str = "No image data received";
pub const ERROR_FILE_TOO_LARGE: &str = "File too large";
pub const ERROR_UNSUPPORTED_IMAGE: &str = "Unsupported image type";
pub const ERROR_INVALID_BASE64: &str = "Invalid base64 image data";
pub const ERROR_MISSING_FILE_PATH: &str = "No file path provided";
pub const ERROR_INVALID_FILE_PATH: &str = "Invalid file path";
pub const ERROR_FILE_NOT_FOUND: &str = "File not found";
pub const ERROR_INVALID_REQUEST: &str = "Invalid request body";
pub const ERROR_STORAGE_FAILED: &str = "Failed to store uploaded image";
pub const ERROR_OCR_FAILED: &str = "Failed to process OCR";
pub const ERROR_OCR_TIMEOUT: &str = "OCR backend timed out";

pub const DETAILS_RETRY_WITH_SAME_REFERENCE: &str =
    "The uploaded image was kept; retry with the same filePath";
pub const DETAILS_RETRY_REQUIRES_UPLOAD: &str =
    "The uploaded image was discarded; upload it again to retry";

pub const STARTUP_BANNER: &str = r#"
╔════════════════════════════════════════════════════════╗
║  image-ocr-server                                      ║
║                                                        ║
║  POST /api/upload          multipart `image` field     ║
║  POST /api/upload-base64   { "image": "<base64>" }     ║
║  POST /api/extract-text    { "filePath": "..." }       ║
║                                                        ║
║  Press Ctrl+C to exit                                  ║
╚════════════════════════════════════════════════════════╝
"#;
