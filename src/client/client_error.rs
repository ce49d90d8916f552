use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to read image {path:?}: {source}")]
    ReadImage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} is not a supported image")]
    UnsupportedImage(String),

    #[error("request to OCR server failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with its `{ error, details? }` envelope.
    #[error("server returned {status}: {message}")]
    Server {
        status: u16,
        message: String,
        details: Option<String>,
    },

    #[error("unexpected response from OCR server: {0}")]
    UnexpectedResponse(String),
}
