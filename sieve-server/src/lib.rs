//! sieve-server library interface
//!
//! Splits large texts into "Prompt" sections, keeps the ones written in the
//! target language, and streams progress to WebSocket clients.

pub mod api;
pub mod classifier;
pub mod config;
pub mod connection;
pub mod error;
pub mod pipeline;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use classifier::ClassifierGate;
use pipeline::PipelineConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Readiness of the process-wide language classifier
    pub gate: ClassifierGate,
    /// Rules applied to every run
    pub pipeline: Arc<PipelineConfig>,
    /// Upper bound for one WebSocket message or HTTP body
    pub max_payload_bytes: usize,
    /// Directory served for non-API paths
    pub static_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        gate: ClassifierGate,
        pipeline: PipelineConfig,
        max_payload_bytes: usize,
        static_dir: PathBuf,
    ) -> Self {
        Self {
            gate,
            pipeline: Arc::new(pipeline),
            max_payload_bytes,
            static_dir,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// API routes first; anything else falls through to the static directory.
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    let body_limit = state.max_payload_bytes;

    Router::new()
        .merge(api::ws_routes())
        .merge(api::filter_routes())
        .merge(api::health_routes())
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
