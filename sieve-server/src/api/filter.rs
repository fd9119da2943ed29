//! One-shot filtering over plain HTTP
//!
//! Same pipeline as the WebSocket path, without progress streaming: the
//! caller gets the final prompt list in the response body.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::connection::not_ready_event;
use crate::error::{ApiError, ApiResult};
use crate::pipeline::{PipelineRun, ProgressEmitter, RunStatus};
use crate::AppState;
use sieve_common::SieveEvent;

/// POST /api/filter request
#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub text: Option<String>,
}

/// POST /api/filter response
#[derive(Debug, Serialize, Deserialize)]
pub struct FilterResponse {
    /// Number of accepted prompts
    pub total: usize,
    /// Accepted prompts in document order
    pub prompts: Vec<String>,
    /// Number of segments found in the text
    pub segments: usize,
    /// False when the run stopped early on its time budget
    pub complete: bool,
}

/// POST /api/filter
pub async fn filter_text(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> ApiResult<Json<FilterResponse>> {
    let text = request
        .text
        .ok_or_else(|| ApiError::BadRequest("Missing 'text' field".to_string()))?;

    let Some(classifier) = state.gate.classifier() else {
        let message = match not_ready_event(&state.gate.state()) {
            SieveEvent::Error { message, .. } => message,
            other => other.event_type().to_string(),
        };
        return Err(ApiError::NotReady(message));
    };

    let run = PipelineRun::new(&state.pipeline, classifier);
    let mut emitter = ProgressEmitter::detached();
    let report = run
        .execute(&text, &mut emitter, &CancellationToken::new())
        .await;

    if report.status == RunStatus::Refused {
        return Err(ApiError::LimitExceeded(format!(
            "Text has {} prompts, more than the limit of {}",
            report.segments, state.pipeline.limits.max_segments
        )));
    }

    info!(
        run_id = %report.run_id,
        segments = report.segments,
        accepted = report.prompts.len(),
        "Filter request served"
    );

    Ok(Json(FilterResponse {
        total: report.prompts.len(),
        complete: report.status == RunStatus::Completed,
        segments: report.segments,
        prompts: report.prompts,
    }))
}

/// Build filter routes
pub fn filter_routes() -> Router<AppState> {
    Router::new().route("/api/filter", post(filter_text))
}
