//! Per-connection lifecycle
//!
//! A connection owns:
//! - a writer task draining the event channel into the transport,
//! - at most one in-flight run task,
//! - a cancellation token that stops the run when the client goes away.
//!
//! **Busy policy:** a payload arriving while a run is in flight is refused
//! with one `error` event; the in-flight run is unaffected. The busy state
//! is cleared before the run's `done` event is queued, so a client that has
//! seen `done` can always start the next run.
//!
//! The handler is transport-agnostic: the WebSocket adapter in
//! `api::ws` maps frames to [`Inbound`] and JSON strings to messages.

use crate::classifier::{ClassifierGate, LanguageClassifier, ModelState};
use crate::pipeline::{PipelineConfig, PipelineRun, ProgressEmitter, RunReport};
use futures::future::OptionFuture;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use sieve_common::SieveEvent;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outbound event buffer per connection
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Message sent when a payload arrives during a run
pub const BUSY_MESSAGE: &str = "A text is already being processed on this connection";

/// Message sent while the language model is loading
pub const NOT_READY_MESSAGE: &str = "Language model is still loading, try again shortly";

/// Transport-neutral inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One complete text payload
    Payload(String),
    /// Control traffic (ping, pong)
    Ignored,
    /// Client closed the connection
    Close,
}

#[derive(Deserialize)]
struct PayloadEnvelope {
    #[serde(default)]
    text: Option<String>,
}

/// Extract the text to process from one inbound frame
///
/// A JSON object is read as `{"text": "..."}` (a missing or null `text`
/// means an empty payload); anything else is the text itself.
pub fn extract_text(frame: &str) -> String {
    if frame.trim_start().starts_with('{') {
        if let Ok(envelope) = serde_json::from_str::<PayloadEnvelope>(frame) {
            return envelope.text.unwrap_or_default();
        }
    }
    frame.to_string()
}

/// Error event for a classifier that cannot take a run
pub fn not_ready_event(state: &ModelState) -> SieveEvent {
    match state {
        ModelState::Failed(reason) => {
            SieveEvent::error(format!("Language model unavailable: {}", reason))
        }
        _ => SieveEvent::error(NOT_READY_MESSAGE),
    }
}

type RunTask = JoinHandle<(RunReport, ProgressEmitter)>;

pub struct ConnectionHandler {
    connection_id: Uuid,
    gate: ClassifierGate,
    config: Arc<PipelineConfig>,
}

impl ConnectionHandler {
    pub fn new(gate: ClassifierGate, config: Arc<PipelineConfig>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            gate,
            config,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Serve one connection until the client closes it
    pub async fn serve<I, O>(self, mut inbound: I, outbound: O)
    where
        I: Stream<Item = Inbound> + Unpin + Send,
        O: Sink<String> + Unpin + Send + 'static,
        O::Error: Display + Send,
    {
        let connection_id = self.connection_id;
        info!(%connection_id, "Connection opened");

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let writer = tokio::spawn(forward_events(event_rx, outbound, connection_id));
        let cancel = CancellationToken::new();
        let mut active: Option<RunTask> = None;

        loop {
            tokio::select! {
                joined = OptionFuture::from(active.as_mut()), if active.is_some() => {
                    active = None;
                    match joined {
                        Some(Ok((report, mut emitter))) => {
                            if report.status.delivers_terminal() {
                                emitter.finish(report.prompts).await;
                            }
                        }
                        Some(Err(e)) => {
                            error!(%connection_id, error = %e, "Run task failed");
                            if event_tx
                                .send(SieveEvent::error("Internal error while processing text"))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        None => {}
                    }
                }

                frame = inbound.next() => {
                    let payload = match frame {
                        Some(Inbound::Payload(payload)) => payload,
                        Some(Inbound::Ignored) => continue,
                        Some(Inbound::Close) | None => break,
                    };

                    let refusal = if active.is_some() {
                        debug!(%connection_id, "Payload refused: run in flight");
                        Some(SieveEvent::error(BUSY_MESSAGE))
                    } else {
                        match self.gate.classifier() {
                            Some(classifier) => {
                                active = Some(self.spawn_run(payload, classifier, &event_tx, &cancel));
                                None
                            }
                            None => {
                                let state = self.gate.state();
                                warn!(%connection_id, classifier = state.label(), "Payload refused: classifier not ready");
                                Some(not_ready_event(&state))
                            }
                        }
                    };

                    if let Some(event) = refusal {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        // Client is gone: stop classifying, discard partial results
        cancel.cancel();
        if let Some(task) = active.take() {
            if let Err(e) = task.await {
                error!(%connection_id, error = %e, "Run task failed during shutdown");
            }
        }
        drop(event_tx);
        if let Err(e) = writer.await {
            error!(%connection_id, error = %e, "Writer task failed");
        }

        info!(%connection_id, "Connection closed");
    }

    fn spawn_run(
        &self,
        payload: String,
        classifier: Arc<dyn LanguageClassifier>,
        event_tx: &mpsc::Sender<SieveEvent>,
        cancel: &CancellationToken,
    ) -> RunTask {
        let run = PipelineRun::new(&self.config, classifier);
        let mut emitter = ProgressEmitter::new(event_tx.clone(), self.config.min_emit_interval);
        let token = cancel.child_token();
        let text = extract_text(&payload);

        debug!(
            connection_id = %self.connection_id,
            run_id = %run.run_id(),
            "Dispatching payload"
        );

        tokio::spawn(async move {
            let report = run.process(&text, &mut emitter, &token).await;
            (report, emitter)
        })
    }
}

/// Writer task: serialize events and push them to the transport
async fn forward_events<O>(mut rx: mpsc::Receiver<SieveEvent>, mut outbound: O, connection_id: Uuid)
where
    O: Sink<String> + Unpin,
    O::Error: Display,
{
    while let Some(event) = rx.recv().await {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(%connection_id, error = %e, "Failed to serialize {} event", event.event_type());
                continue;
            }
        };

        if let Err(e) = outbound.send(json).await {
            debug!(%connection_id, error = %e, "Outbound transport closed");
            return;
        }
    }

    if let Err(e) = outbound.close().await {
        debug!(%connection_id, error = %e, "Outbound close failed");
    }
}
