//! Test Helper Utilities
//!
//! Shared utilities for testing sieve-server

#![allow(dead_code)]

use async_trait::async_trait;
use sieve_common::SieveEvent;
use sieve_server::classifier::{
    ClassifierError, ClassifierGate, LanguageClassifier, ModelState, Prediction,
};
use sieve_server::pipeline::PipelineConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Text of the first worked example: one English and one French prompt
pub const MIXED_PAYLOAD: &str = "noise\nPrompt 1\nHello world this is clearly English text padding to exceed threshold.\nResumo: resumo text\nPrompt 2\nBonjour ceci est du texte français qui ne doit pas passer.\n";

/// The only prompt accepted from [`MIXED_PAYLOAD`]
pub const MIXED_ACCEPTED: &str =
    "Hello world this is clearly English text padding to exceed threshold.";

/// Deterministic classifier driven by keywords
///
/// - "bonjour" anywhere → `fra`
/// - "hola" anywhere → `spa`
/// - "EXPLODE" anywhere → prediction failure
/// - otherwise → `eng` with confidence 0.99
pub struct ScriptedClassifier {
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long in every `predict` call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter of `predict` calls
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl LanguageClassifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&mut self) -> Result<(), ClassifierError> {
        Ok(())
    }

    async fn predict(&self, text: &str, _k: usize) -> Result<Vec<Prediction>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if text.contains("EXPLODE") {
            return Err(ClassifierError::PredictionFailed("scripted failure".to_string()));
        }

        let lower = text.to_lowercase();
        let label = if lower.contains("bonjour") {
            "fra"
        } else if lower.contains("hola") {
            "spa"
        } else {
            "eng"
        };

        Ok(vec![Prediction {
            label: label.to_string(),
            confidence: 0.99,
        }])
    }
}

/// Shareable instance plus its call counter
pub fn scripted() -> (Arc<dyn LanguageClassifier>, Arc<AtomicUsize>) {
    let classifier = ScriptedClassifier::new();
    let calls = classifier.calls();
    (Arc::new(classifier), calls)
}

/// Gate that is already ready with the scripted classifier
pub fn ready_gate() -> (ClassifierGate, Arc<AtomicUsize>) {
    let (classifier, calls) = scripted();
    (ClassifierGate::ready(classifier), calls)
}

/// Gate that is ready with a slow scripted classifier
pub fn slow_gate(delay: Duration) -> (ClassifierGate, Arc<AtomicUsize>) {
    let classifier = ScriptedClassifier::new().with_delay(delay);
    let calls = classifier.calls();
    (ClassifierGate::ready(Arc::new(classifier)), calls)
}

pub fn loading_gate() -> ClassifierGate {
    ClassifierGate::from_state(ModelState::Loading)
}

pub fn failed_gate(reason: &str) -> ClassifierGate {
    ClassifierGate::from_state(ModelState::Failed(reason.to_string()))
}

/// Pipeline configuration with defaults (min length 40, target "eng")
pub fn test_pipeline_config() -> PipelineConfig {
    PipelineConfig::default()
}

/// Build a payload with `count` English prompts long enough to pass
pub fn english_payload(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                "Prompt {}\nPlease write a short story about a lighthouse keeper, number {}.\n",
                i + 1,
                i
            )
        })
        .collect()
}

/// Drain every event currently buffered in the channel
pub fn drain(rx: &mut mpsc::Receiver<SieveEvent>) -> Vec<SieveEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Short type tags, e.g. ["init", "progress", "done"]
pub fn event_types(events: &[SieveEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}
