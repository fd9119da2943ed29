//! Event types streamed to sieve clients
//!
//! Every run produces, in order: one `init` event, one `progress` event per
//! segment, any number of non-fatal `error` events interleaved with them, and
//! exactly one terminal `done` event.

use serde::{Deserialize, Serialize};

/// Sieve wire events
///
/// Serialized as JSON objects internally tagged on `type`, e.g.
/// `{"type":"progress","processed":3,"valid":1,"percent":30}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SieveEvent {
    /// Segmentation finished; total number of candidate segments is known
    Init {
        /// Number of segments that will be processed
        total: usize,
    },

    /// One more segment has been processed
    Progress {
        /// Segments processed so far (1-based after the first segment)
        processed: usize,
        /// Segments accepted so far
        valid: usize,
        /// floor(100 * processed / total)
        percent: u8,
    },

    /// Advisory error
    ///
    /// Sent instead of a run when the payload is refused (classifier not
    /// ready, run already in flight, too many segments) and during a run for
    /// per-segment classification failures. Never fatal to the connection.
    Error {
        /// Human readable description
        message: String,
        /// Index of the failing segment, for per-segment failures
        #[serde(default, skip_serializing_if = "Option::is_none")]
        segment: Option<usize>,
    },

    /// Terminal event of a run
    Done {
        /// Number of accepted prompts
        total: usize,
        /// Accepted prompts in document order
        prompts: Vec<String>,
    },
}

impl SieveEvent {
    /// Build a connection-level error event
    pub fn error(message: impl Into<String>) -> Self {
        SieveEvent::Error {
            message: message.into(),
            segment: None,
        }
    }

    /// Build a per-segment error event
    pub fn segment_error(segment: usize, message: impl Into<String>) -> Self {
        SieveEvent::Error {
            message: message.into(),
            segment: Some(segment),
        }
    }

    /// Build the terminal event from the accepted prompts
    pub fn done(prompts: Vec<String>) -> Self {
        SieveEvent::Done {
            total: prompts.len(),
            prompts,
        }
    }

    /// Get event type as string (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            SieveEvent::Init { .. } => "init",
            SieveEvent::Progress { .. } => "progress",
            SieveEvent::Error { .. } => "error",
            SieveEvent::Done { .. } => "done",
        }
    }

    /// True for the event that closes a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, SieveEvent::Done { .. })
    }

    /// Serialize to the JSON text sent over the wire
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
