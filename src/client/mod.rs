//! HTTP client for the OCR server, used by the `ocr-client` binary.

mod client_error;
mod ocr_server_client;
mod transport_encoder;

pub use client_error::ClientError;
pub use ocr_server_client::OcrServerClient;
pub use transport_encoder::{Base64Payload, EncodedImage, TransportEncoding};
