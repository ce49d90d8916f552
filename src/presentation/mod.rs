mod base64_payload;
mod extract_handlers;
pub mod response_envelope;
mod routes;
mod upload_handlers;

pub use extract_handlers::ExtractTextRequest;
pub use routes::{build_router, AppState, HealthResponse};
pub use upload_handlers::Base64UploadRequest;
