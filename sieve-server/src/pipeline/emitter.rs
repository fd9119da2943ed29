//! Progress emission
//!
//! Turns run state into the ordered event stream a client sees. Events go
//! into a bounded mpsc channel drained by the connection's writer task.
//!
//! **Pacing:** an optional minimum interval between events. Pacing delays
//! an event, it never drops one; every segment gets its progress event.
//!
//! **Closure:** once a send fails (receiver gone) the emitter stays closed
//! and every later `emit` returns false, which the pipeline treats as a
//! cancellation signal.

use sieve_common::SieveEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub processed: usize,
    pub accepted: usize,
    pub total: usize,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            processed: 0,
            accepted: 0,
            total,
        }
    }

    /// Account for one more processed segment
    pub fn record(&mut self, accepted: bool) {
        self.processed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// floor(100 * processed / total); 0 when total is 0
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.processed.min(self.total) * 100 / self.total) as u8
    }

    pub fn to_event(&self) -> SieveEvent {
        SieveEvent::Progress {
            processed: self.processed,
            valid: self.accepted,
            percent: self.percent(),
        }
    }
}

/// Ordered event sink for one run
pub struct ProgressEmitter {
    tx: Option<mpsc::Sender<SieveEvent>>,
    min_interval: Duration,
    last_emission: Option<Instant>,
    closed: bool,
    emitted: usize,
}

impl ProgressEmitter {
    /// Emitter feeding `tx`, spacing events at least `min_interval` apart
    pub fn new(tx: mpsc::Sender<SieveEvent>, min_interval: Duration) -> Self {
        Self {
            tx: Some(tx),
            min_interval,
            last_emission: None,
            closed: false,
            emitted: 0,
        }
    }

    /// Emitter with no listener, for callers that only want the final result
    pub fn detached() -> Self {
        Self {
            tx: None,
            min_interval: Duration::ZERO,
            last_emission: None,
            closed: false,
            emitted: 0,
        }
    }

    /// Send one event, waiting out the pacing interval first
    ///
    /// Returns false if the receiver is gone.
    pub async fn emit(&mut self, event: SieveEvent) -> bool {
        if self.closed {
            return false;
        }
        let Some(tx) = self.tx.as_ref() else {
            self.emitted += 1;
            return true;
        };

        if let Some(last) = self.last_emission {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        let event_type = event.event_type();
        match tx.send(event).await {
            Ok(()) => {
                self.last_emission = Some(Instant::now());
                self.emitted += 1;
                true
            }
            Err(_) => {
                debug!("Event receiver dropped, discarding {} and later events", event_type);
                self.closed = true;
                false
            }
        }
    }

    /// Emit the terminal event of a run
    pub async fn finish(&mut self, prompts: Vec<String>) -> bool {
        self.emit(SieveEvent::done(prompts)).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Events successfully handed to the channel so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}
