use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use services::{FunctionBody, ProgressFunction};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const PROGRESS_CALCULATION_PATH: &str = "/functions/progress-calculation";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Pass the raw body through so malformed JSON is reported by the function itself.
async fn progress_calculation(
    State(function): State<Arc<ProgressFunction>>,
    body: String,
) -> (StatusCode, Json<FunctionBody>) {
    let response = function.handle(&body).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}

/// HTTP surface hosting the progress calculation function.
pub fn router(function: Arc<ProgressFunction>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(PROGRESS_CALCULATION_PATH, post(progress_calculation))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(function)
}
