//! Language classification
//!
//! The pipeline only depends on [`LanguageClassifier`]. Backends are built
//! by [`build_classifier`] from configuration and handed to the
//! [`ClassifierGate`], which loads them once and publishes readiness.

pub mod gate;
pub mod whatlang_classifier;

pub use gate::{ClassifierGate, ModelState};
pub use whatlang_classifier::WhatlangClassifier;

use async_trait::async_trait;
use sieve_common::config::ClassifierSettings;
use thiserror::Error;

/// One ranked language guess
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Language label (ISO 639-3 for the built-in backend, e.g. "eng")
    pub label: String,
    /// Confidence in 0.0..=1.0
    pub confidence: f64,
}

/// Classifier errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Classifier used before it was loaded")]
    NotLoaded,

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),
}

/// Language identification backend
///
/// `load` runs exactly once, before the classifier is shared. After that the
/// instance is read-only and may serve concurrent `predict` calls.
#[async_trait]
pub trait LanguageClassifier: Send + Sync {
    /// Backend name for logs and health output
    fn name(&self) -> &str;

    /// Acquire and load the model
    async fn load(&mut self) -> Result<(), ClassifierError>;

    /// Return up to `k` predictions, best first
    async fn predict(&self, text: &str, k: usize) -> Result<Vec<Prediction>, ClassifierError>;
}

/// Construct the configured backend (not yet loaded)
pub fn build_classifier(
    settings: &ClassifierSettings,
) -> Result<Box<dyn LanguageClassifier>, ClassifierError> {
    match settings.backend.as_str() {
        "whatlang" => Ok(Box::new(WhatlangClassifier::new(settings.allowlist.clone()))),
        other => Err(ClassifierError::InitializationFailed(format!(
            "unknown classifier backend '{}'",
            other
        ))),
    }
}
