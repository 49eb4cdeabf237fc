use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Answer Grader API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        contract: state.settings().grading().contract.as_str().to_string(),
    })
}

/// Reports configuration readiness only; upstream services are not probed.
pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipeline = state.pipeline();
    let mut components = HashMap::new();

    let readiness = |configured: bool| if configured { "configured" } else { "unconfigured" };
    components.insert("ocr".to_string(), readiness(pipeline.extractor().is_configured()).to_string());
    components.insert("llm".to_string(), readiness(pipeline.grader().is_configured()).to_string());
    components.insert("contract".to_string(), pipeline.grader().contract().as_str().to_string());

    let status = if pipeline.extractor().is_configured() && pipeline.grader().is_configured() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        service: "answer-grader".to_string(),
        status: status.to_string(),
        components,
    })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
