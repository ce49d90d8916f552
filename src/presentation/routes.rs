use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::core::orchestrators::ocr_pipeline::OcrPipeline;
use crate::global_constants;
use crate::presentation::extract_handlers::extract_text;
use crate::presentation::upload_handlers::{upload_base64, upload_image};
use crate::server_settings::PipelineMode;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<OcrPipeline>,
    pub pipeline_mode: PipelineMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub storage: String,
    pub pipeline_mode: PipelineMode,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.pipeline.backend_name().to_string(),
        storage: state.pipeline.storage_kind().to_string(),
        pipeline_mode: state.pipeline_mode,
    })
}

pub fn build_router(state: AppState, request_body_limit: usize) -> Router {
    Router::new()
        .route(global_constants::ROUTE_UPLOAD, post(upload_image))
        .route(global_constants::ROUTE_UPLOAD_BASE64, post(upload_base64))
        .route(global_constants::ROUTE_EXTRACT_TEXT, post(extract_text))
        .route(global_constants::ROUTE_HEALTH, get(health))
        .layer(DefaultBodyLimit::max(request_body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
