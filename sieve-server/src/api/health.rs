//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::classifier::ModelState;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" once the classifier is ready, "degraded" otherwise
    pub status: String,
    /// Module name ("sieve-server")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Classifier lifecycle state ("uninitialized", "loading", "ready", "failed")
    pub classifier: String,
    /// Load failure reason, if the classifier failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let model = state.gate.state();
    let status = match model {
        ModelState::Ready(_) => "ok",
        _ => "degraded",
    };
    let last_error = match &model {
        ModelState::Failed(reason) => Some(reason.clone()),
        _ => None,
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "sieve-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        classifier: model.label().to_string(),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
