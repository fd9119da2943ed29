//! Classifier readiness gate
//!
//! Process-wide initialization state, published through a `watch` channel:
//!
//! ```text
//! Uninitialized -> Loading -> Ready(classifier)
//!                          \-> Failed(reason)
//! ```
//!
//! Connection handlers only read the current state. Only `Ready` hands out
//! the shared classifier, so a run can never start against a model that is
//! still loading.

use super::LanguageClassifier;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Lifecycle of the process-wide classifier
#[derive(Clone)]
pub enum ModelState {
    Uninitialized,
    Loading,
    Ready(Arc<dyn LanguageClassifier>),
    Failed(String),
}

impl ModelState {
    /// Short label for logs and health output
    pub fn label(&self) -> &'static str {
        match self {
            ModelState::Uninitialized => "uninitialized",
            ModelState::Loading => "loading",
            ModelState::Ready(_) => "ready",
            ModelState::Failed(_) => "failed",
        }
    }

    fn is_settled(&self) -> bool {
        matches!(self, ModelState::Ready(_) | ModelState::Failed(_))
    }
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Ready(classifier) => write!(f, "Ready({})", classifier.name()),
            ModelState::Failed(reason) => write!(f, "Failed({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Read-only view of the classifier lifecycle, cheap to clone
#[derive(Clone)]
pub struct ClassifierGate {
    rx: watch::Receiver<ModelState>,
}

impl ClassifierGate {
    /// Start loading `classifier` on a background task
    ///
    /// Returns immediately; the gate reports `Loading` until the load
    /// settles. A failed load is logged and leaves the gate in `Failed`
    /// for the rest of the process lifetime.
    pub fn initialize(mut classifier: Box<dyn LanguageClassifier>) -> Self {
        let (tx, rx) = watch::channel(ModelState::Uninitialized);

        tokio::spawn(async move {
            let name = classifier.name().to_string();
            tx.send_replace(ModelState::Loading);
            info!(backend = %name, "Loading language classifier");

            let state = match classifier.load().await {
                Ok(()) => {
                    info!(backend = %name, "Language classifier ready");
                    ModelState::Ready(Arc::from(classifier))
                }
                Err(e) => {
                    error!(backend = %name, error = %e, "Language classifier failed to load");
                    ModelState::Failed(e.to_string())
                }
            };
            tx.send_replace(state);
        });

        Self { rx }
    }

    /// Gate pinned to a fixed state
    pub fn from_state(state: ModelState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    /// Gate around an already loaded classifier
    pub fn ready(classifier: Arc<dyn LanguageClassifier>) -> Self {
        Self::from_state(ModelState::Ready(classifier))
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ModelState {
        self.rx.borrow().clone()
    }

    /// The shared classifier, if loading has finished successfully
    pub fn classifier(&self) -> Option<Arc<dyn LanguageClassifier>> {
        match &*self.rx.borrow() {
            ModelState::Ready(classifier) => Some(Arc::clone(classifier)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.rx.borrow(), ModelState::Ready(_))
    }

    /// Wait until loading has either succeeded or failed
    pub async fn settled(&self) -> ModelState {
        let mut rx = self.rx.clone();
        if let Ok(state) = rx.wait_for(ModelState::is_settled).await {
            return state.clone();
        }
        // Sender gone without settling: report whatever was last published
        let last = rx.borrow().clone();
        last
    }
}
