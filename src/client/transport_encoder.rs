use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::Engine;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use crate::client::ClientError;
use crate::core::models::ImageFormat;
use crate::global_constants;

/// How an image travels to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEncoding {
    /// `multipart/form-data` with a single `image` part.
    Multipart,
    /// JSON body for `/api/upload-base64`.
    Base64,
}

impl fmt::Display for TransportEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEncoding::Multipart => write!(f, "multipart"),
            TransportEncoding::Base64 => write!(f, "base64"),
        }
    }
}

impl FromStr for TransportEncoding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "multipart" | "binary" => Ok(TransportEncoding::Multipart),
            "base64" => Ok(TransportEncoding::Base64),
            other => Err(format!(
                "unknown encoding '{}', expected multipart or base64",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Base64Payload {
    pub image: String,
    pub mime_type: String,
    pub file_name: String,
}

/// Image bytes plus the name and MIME type sent alongside them.
#[derive(Clone)]
pub struct EncodedImage {
    pub file_name: String,
    pub mime_type: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl EncodedImage {
    /// The MIME type comes from the bytes, not from the file name.
    pub fn from_bytes(bytes: Vec<u8>, file_name: Option<&str>) -> Result<Self, ClientError> {
        let label = file_name.unwrap_or(global_constants::DEFAULT_UPLOAD_FILE_NAME);
        let format = ImageFormat::sniff(&bytes)
            .ok_or_else(|| ClientError::UnsupportedImage(label.to_string()))?;

        let file_name = match file_name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!(
                "{}.{}",
                global_constants::DEFAULT_UPLOAD_FILE_NAME,
                format.file_extension()
            ),
        };

        Ok(Self {
            file_name,
            mime_type: format.mime_type().to_string(),
            bytes,
        })
    }

    pub async fn read_file(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::ReadImage {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path.file_name().and_then(|name| name.to_str());

        log::debug!("[CLIENT] Read {} bytes from {:?}", bytes.len(), path);
        Self::from_bytes(bytes, file_name)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_multipart_form(&self) -> Result<Form, ClientError> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime_type)?;
        Ok(Form::new().part(global_constants::IMAGE_FIELD_NAME, part))
    }

    pub fn to_base64_payload(&self) -> Base64Payload {
        Base64Payload {
            image: base64::engine::general_purpose::STANDARD.encode(&self.bytes),
            mime_type: self.mime_type.clone(),
            file_name: self.file_name.clone(),
        }
    }
}
