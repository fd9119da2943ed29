//! Prompt filtering pipeline
//!
//! # Architecture
//! - **Segmenter**: payload → ordered candidate segments (full pass first,
//!   so the total is known before filtering)
//! - **Filter**: per segment length check, then language check
//! - **Emitter**: ordered init / progress / error / done events
//! - **Run**: ties the three together for one payload
//!
//! # Error Handling
//! - Per-segment isolation: a classifier failure rejects that segment only
//! - Run-level stops: cancellation, closed receiver, optional time budget

pub mod emitter;
pub mod filter;
pub mod run;
pub mod segmenter;

pub use emitter::{ProgressEmitter, ProgressState};
pub use filter::{AcceptedPrompt, FilterConfig, FilterPipeline, SegmentDecision};
pub use run::{PipelineRun, RunLimits, RunReport, RunStatus};
pub use segmenter::{segment, Segment};

use sieve_common::config::PipelineSettings;
use std::time::Duration;

/// Everything a run needs besides the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub filter: FilterConfig,
    pub limits: RunLimits,
    /// Minimum spacing between emitted events
    pub min_emit_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            filter: FilterConfig::from(settings),
            limits: RunLimits {
                max_segments: settings.max_segments,
                timeout: settings.run_timeout_secs.map(Duration::from_secs),
            },
            min_emit_interval: Duration::from_millis(settings.min_emit_interval_ms),
        }
    }
}
