// Health and execution-info endpoints served next to the worker loop
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use cscore_engine::ExecutionOrchestrator;
use std::sync::Arc;

pub fn router(orchestrator: Arc<ExecutionOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/execution-info", get(execution_info))
        .with_state(orchestrator)
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /execution-info - resolved strategy and remote availability
async fn execution_info(State(orchestrator): State<Arc<ExecutionOrchestrator>>) -> impl IntoResponse {
    Json(orchestrator.execution_info().await)
}
