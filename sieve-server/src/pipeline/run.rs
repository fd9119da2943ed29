//! One payload, start to finish
//!
//! A run segments the payload, announces the total, filters every segment
//! and reports what it accepted. The terminal `done` event is emitted by
//! [`PipelineRun::execute`], or by the caller through
//! [`ProgressEmitter::finish`] when it needs to update its own bookkeeping
//! first (the connection handler clears its busy state before the client can
//! observe `done`).

use super::emitter::ProgressEmitter;
use super::filter::{FilterPipeline, StopReason};
use super::segmenter::segment;
use super::PipelineConfig;
use crate::classifier::LanguageClassifier;
use sieve_common::SieveEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Limits that keep a pathological payload from running unbounded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLimits {
    pub max_segments: usize,
    pub timeout: Option<Duration>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every segment processed
    Completed,
    /// Time budget exhausted; `prompts` holds what was accepted until then
    TimedOut,
    /// Too many segments; nothing was classified
    Refused,
    /// Connection went away
    Cancelled,
    /// Event receiver went away
    SinkClosed,
}

impl RunStatus {
    /// Whether the client should still receive the terminal event
    pub fn delivers_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::TimedOut)
    }
}

/// Result of [`PipelineRun::process`]
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub segments: usize,
    pub processed: usize,
    /// Accepted prompts in document order
    pub prompts: Vec<String>,
}

pub struct PipelineRun {
    run_id: Uuid,
    filter: FilterPipeline,
    limits: RunLimits,
}

impl PipelineRun {
    pub fn new(config: &PipelineConfig, classifier: Arc<dyn LanguageClassifier>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            filter: FilterPipeline::new(config.filter.clone(), classifier),
            limits: config.limits.clone(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Process the payload and emit the terminal event
    pub async fn execute(
        &self,
        payload: &str,
        emitter: &mut ProgressEmitter,
        cancel: &CancellationToken,
    ) -> RunReport {
        let report = self.process(payload, emitter, cancel).await;
        if report.status.delivers_terminal() {
            emitter.finish(report.prompts.clone()).await;
        }
        report
    }

    /// Everything except the terminal event
    pub async fn process(
        &self,
        payload: &str,
        emitter: &mut ProgressEmitter,
        cancel: &CancellationToken,
    ) -> RunReport {
        let span = tracing::info_span!("run", run_id = %self.run_id);
        self.process_inner(payload, emitter, cancel)
            .instrument(span)
            .await
    }

    async fn process_inner(
        &self,
        payload: &str,
        emitter: &mut ProgressEmitter,
        cancel: &CancellationToken,
    ) -> RunReport {
        let started = Instant::now();
        let segments = segment(payload);
        let total = segments.len();

        info!(
            payload_bytes = payload.len(),
            segments = total,
            "Run started"
        );

        if total > self.limits.max_segments {
            warn!(
                segments = total,
                limit = self.limits.max_segments,
                "Payload refused: too many segments"
            );
            emitter
                .emit(SieveEvent::error(format!(
                    "Text has {} prompts, more than the limit of {}",
                    total, self.limits.max_segments
                )))
                .await;
            return self.report(RunStatus::Refused, total, 0, Vec::new());
        }

        if !emitter.emit(SieveEvent::Init { total }).await {
            return self.report(RunStatus::SinkClosed, total, 0, Vec::new());
        }

        let deadline = self.limits.timeout.map(|timeout| started + timeout);
        let outcome = self.filter.run(&segments, emitter, cancel, deadline).await;

        let status = match outcome.stopped {
            None => RunStatus::Completed,
            Some(StopReason::Cancelled) => RunStatus::Cancelled,
            Some(StopReason::SinkClosed) => RunStatus::SinkClosed,
            Some(StopReason::TimedOut) => {
                let budget = self.limits.timeout.unwrap_or_default();
                warn!(
                    processed = outcome.progress.processed,
                    segments = total,
                    "Run exceeded its time budget"
                );
                emitter
                    .emit(SieveEvent::error(format!(
                        "Processing stopped after {}s time limit: {} of {} prompts checked",
                        budget.as_secs(),
                        outcome.progress.processed,
                        total
                    )))
                    .await;
                RunStatus::TimedOut
            }
        };

        let prompts: Vec<String> = outcome.accepted.into_iter().map(|p| p.text).collect();

        info!(
            status = ?status,
            processed = outcome.progress.processed,
            accepted = prompts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run finished"
        );

        self.report(status, total, outcome.progress.processed, prompts)
    }

    fn report(
        &self,
        status: RunStatus,
        segments: usize,
        processed: usize,
        prompts: Vec<String>,
    ) -> RunReport {
        RunReport {
            run_id: self.run_id,
            status,
            segments,
            processed,
            prompts,
        }
    }
}
