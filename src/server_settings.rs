use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::global_constants;

pub const ENV_SETTINGS_FILE: &str = "OCR_SERVER_SETTINGS_FILE";
pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND_ADDRESS: &str = "BIND_ADDRESS";
pub const ENV_MAX_UPLOAD_BYTES: &str = "MAX_UPLOAD_BYTES";
pub const ENV_TRANSIENT_DIR: &str = "TRANSIENT_DIR";
pub const ENV_STORAGE_MODE: &str = "STORAGE_MODE";
pub const ENV_PIPELINE_MODE: &str = "PIPELINE_MODE";
pub const ENV_OCR_BACKEND: &str = "OCR_BACKEND";
pub const ENV_GOOGLE_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ENV_GOOGLE_VISION_API_KEY: &str = "GOOGLE_VISION_API_KEY";
pub const ENV_GOOGLE_VISION_ENDPOINT: &str = "GOOGLE_VISION_ENDPOINT";
pub const ENV_TESSERACT_LANGUAGE: &str = "TESSERACT_LANGUAGE";
pub const ENV_TESSERACT_PSM: &str = "TESSERACT_PSM";
pub const ENV_OCR_TIMEOUT_SECONDS: &str = "OCR_TIMEOUT_SECONDS";
pub const ENV_RETAIN_ON_BACKEND_FAILURE: &str = "RETAIN_ON_BACKEND_FAILURE";
pub const ENV_TRANSIENT_TTL_SECONDS: &str = "TRANSIENT_TTL_SECONDS";
pub const ENV_SWEEP_INTERVAL_SECONDS: &str = "SWEEP_INTERVAL_SECONDS";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    Disk,
    Memory,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Disk => write!(f, "disk"),
            StorageMode::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(StorageMode::Disk),
            "memory" => Ok(StorageMode::Memory),
            other => Err(format!("unknown storage mode '{}', expected disk or memory", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    SingleCall,
    TwoCall,
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMode::SingleCall => write!(f, "single-call"),
            PipelineMode::TwoCall => write!(f, "two-call"),
        }
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single-call" | "single" => Ok(PipelineMode::SingleCall),
            "two-call" | "two" => Ok(PipelineMode::TwoCall),
            other => Err(format!(
                "unknown pipeline mode '{}', expected single-call or two-call",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OcrBackend {
    GoogleVision,
    Tesseract,
}

impl fmt::Display for OcrBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrBackend::GoogleVision => write!(f, "google-vision"),
            OcrBackend::Tesseract => write!(f, "tesseract"),
        }
    }
}

impl FromStr for OcrBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google-vision" | "vision" | "google" => Ok(OcrBackend::GoogleVision),
            "tesseract" => Ok(OcrBackend::Tesseract),
            other => Err(format!(
                "unknown OCR backend '{}', expected google-vision or tesseract",
                other
            )),
        }
    }
}

/// Process-wide configuration, resolved once at startup and read-only after.
///
/// Sources in increasing priority: built-in defaults, the JSON file named by
/// `OCR_SERVER_SETTINGS_FILE`, then individual environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub transient_dir: PathBuf,
    pub storage_mode: StorageMode,
    pub pipeline_mode: PipelineMode,
    pub ocr_backend: OcrBackend,
    pub google_credentials_path: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub google_vision_api_key: Option<String>,
    pub google_vision_endpoint: String,
    pub tesseract_language: String,
    pub tesseract_psm: Option<u8>,
    pub ocr_timeout_seconds: u64,
    pub retain_on_backend_failure: bool,
    pub transient_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: global_constants::DEFAULT_BIND_ADDRESS.to_string(),
            port: global_constants::DEFAULT_PORT,
            max_upload_bytes: global_constants::DEFAULT_MAX_UPLOAD_BYTES,
            transient_dir: Self::default_transient_dir(),
            storage_mode: StorageMode::Disk,
            pipeline_mode: PipelineMode::SingleCall,
            ocr_backend: OcrBackend::GoogleVision,
            google_credentials_path: None,
            google_vision_api_key: None,
            google_vision_endpoint: global_constants::DEFAULT_GOOGLE_VISION_ENDPOINT.to_string(),
            tesseract_language: global_constants::DEFAULT_TESSERACT_LANGUAGE.to_string(),
            tesseract_psm: None,
            ocr_timeout_seconds: global_constants::DEFAULT_OCR_TIMEOUT_SECONDS,
            retain_on_backend_failure: true,
            transient_ttl_seconds: global_constants::DEFAULT_TRANSIENT_TTL_SECONDS,
            sweep_interval_seconds: global_constants::DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl ServerSettings {
    pub fn load() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(&env)
    }

    /// Same as [`ServerSettings::load`] but reads variables from `env`.
    pub fn load_from(env: &HashMap<String, String>) -> Result<Self> {
        let mut settings = match non_empty(env, ENV_SETTINGS_FILE) {
            Some(path) => Self::read_settings_file(Path::new(path))?,
            None => {
                log::debug!("[SETTINGS] No settings file configured, using defaults");
                Self::default()
            }
        };

        settings.apply_env_overrides(env)?;
        settings.validate()?;

        log::info!(
            "[SETTINGS] backend={}, storage={}, pipeline={}, max_upload_bytes={}",
            settings.ocr_backend,
            settings.storage_mode,
            settings.pipeline_mode,
            settings.max_upload_bytes
        );
        log::debug!("[SETTINGS] Transient directory: {:?}", settings.transient_dir);

        Ok(settings)
    }

    pub fn socket_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    self.bind_address, self.port
                )
            })
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_seconds)
    }

    pub fn transient_ttl(&self) -> Duration {
        Duration::from_secs(self.transient_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Body limit for the router.
    ///
    /// Sized for the largest accepted image sent as line-wrapped base64 inside
    /// JSON, so the encoded length and the escaped line breaks both grow with
    /// `max_upload_bytes`.
    pub fn request_body_limit(&self) -> usize {
        let encoded = self.max_upload_bytes.div_ceil(3).saturating_mul(4);
        let line_breaks = encoded
            .div_ceil(global_constants::BASE64_MIN_LINE_WIDTH)
            .saturating_mul(global_constants::JSON_ESCAPED_LINE_BREAK_BYTES);

        encoded
            .saturating_add(line_breaks)
            .saturating_add(global_constants::REQUEST_BODY_OVERHEAD_BYTES)
    }

    fn read_settings_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        let settings: ServerSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {:?}", path))?;

        log::info!("[SETTINGS] Loaded settings from {:?}", path);
        Ok(settings)
    }

    fn apply_env_overrides(&mut self, env: &HashMap<String, String>) -> Result<()> {
        if let Some(value) = non_empty(env, ENV_BIND_ADDRESS) {
            self.bind_address = value.to_string();
        }
        if let Some(value) = parse_env(env, ENV_PORT)? {
            self.port = value;
        }
        if let Some(value) = parse_env(env, ENV_MAX_UPLOAD_BYTES)? {
            self.max_upload_bytes = value;
        }
        if let Some(value) = non_empty(env, ENV_TRANSIENT_DIR) {
            self.transient_dir = PathBuf::from(value);
        }
        if let Some(value) = parse_env(env, ENV_STORAGE_MODE)? {
            self.storage_mode = value;
        }
        if let Some(value) = parse_env(env, ENV_PIPELINE_MODE)? {
            self.pipeline_mode = value;
        }
        if let Some(value) = parse_env(env, ENV_OCR_BACKEND)? {
            self.ocr_backend = value;
        }
        if let Some(value) = non_empty(env, ENV_GOOGLE_CREDENTIALS) {
            self.google_credentials_path = Some(PathBuf::from(value));
        }
        if let Some(value) = non_empty(env, ENV_GOOGLE_VISION_API_KEY) {
            self.google_vision_api_key = Some(value.to_string());
        }
        if let Some(value) = non_empty(env, ENV_GOOGLE_VISION_ENDPOINT) {
            self.google_vision_endpoint = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = non_empty(env, ENV_TESSERACT_LANGUAGE) {
            self.tesseract_language = value.to_string();
        }
        if let Some(value) = parse_env(env, ENV_TESSERACT_PSM)? {
            self.tesseract_psm = Some(value);
        }
        if let Some(value) = parse_env(env, ENV_OCR_TIMEOUT_SECONDS)? {
            self.ocr_timeout_seconds = value;
        }
        if let Some(value) = non_empty(env, ENV_RETAIN_ON_BACKEND_FAILURE) {
            self.retain_on_backend_failure = parse_flag(ENV_RETAIN_ON_BACKEND_FAILURE, value)?;
        }
        if let Some(value) = parse_env(env, ENV_TRANSIENT_TTL_SECONDS)? {
            self.transient_ttl_seconds = value;
        }
        if let Some(value) = parse_env(env, ENV_SWEEP_INTERVAL_SECONDS)? {
            self.sweep_interval_seconds = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            anyhow::bail!("{} must be greater than zero", ENV_MAX_UPLOAD_BYTES);
        }
        if self.ocr_timeout_seconds == 0 {
            anyhow::bail!("{} must be greater than zero", ENV_OCR_TIMEOUT_SECONDS);
        }
        if self.sweep_interval_seconds == 0 {
            anyhow::bail!("{} must be greater than zero", ENV_SWEEP_INTERVAL_SECONDS);
        }
        if self.transient_ttl_seconds == 0 {
            anyhow::bail!("{} must be greater than zero", ENV_TRANSIENT_TTL_SECONDS);
        }
        if self.tesseract_language.trim().is_empty() {
            anyhow::bail!("{} must not be empty", ENV_TESSERACT_LANGUAGE);
        }
        if let Some(psm) = self.tesseract_psm {
            if psm > 13 {
                anyhow::bail!("{} must be between 0 and 13, got {}", ENV_TESSERACT_PSM, psm);
            }
        }
        self.socket_address()?;
        Ok(())
    }

    fn default_transient_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(global_constants::APPLICATION_NAME)
            .join(global_constants::TRANSIENT_DIR_NAME)
    }
}

fn non_empty<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(env: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match non_empty(env, key) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|error| anyhow::anyhow!("Invalid value for {}: {}", key, error)),
        None => Ok(None),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid value for {}: '{}' is not a boolean", key, other),
    }
}
