// src/api.rs
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::HttpConfig;
use crate::service::{AnalysisError, AnalysisService};

pub const INDEX_BODY: &str = "Phishing Detection API is running!";

#[derive(Clone, Debug)]
pub struct AppState {
    pub service: AnalysisService,
}

impl AppState {
    pub fn new(service: AnalysisService) -> Self {
        Self { service }
    }
}

/// Router with default HTTP settings (permissive CORS, 1 MiB body limit).
pub fn create_router(state: AppState) -> Router {
    router(state, &HttpConfig::default())
}

pub fn router(state: AppState, cfg: &HttpConfig) -> Router {
    let mut app = Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "OK" }))
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(cfg.body_limit_bytes));
    if cfg.cors_permissive {
        app = app.layer(CorsLayer::very_permissive());
    }
    app.with_state(state)
}

async fn index() -> &'static str {
    INDEX_BODY
}

/// The body is taken as raw bytes so that missing keys, wrong types and
/// non-JSON bodies all get the JSON error shape instead of axum's plain-text
/// extractor rejections.
async fn analyze(State(state): State<AppState>, body: Bytes) -> Response {
    info!(bytes = body.len(), "received request for /analyze");

    match state.service.analyze_bytes(&body).await {
        Ok(result) => {
            crate::metrics::record_result(&result);
            Json(result).into_response()
        }
        Err(e) => {
            crate::metrics::record_error(e.kind());
            e.into_response()
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self, "error during analysis");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
