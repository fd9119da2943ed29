//! Built-in classifier backed by the `whatlang` trigram detector
//!
//! The detector ships its language profiles inside the crate, so `load`
//! only validates the configured allowlist and builds the detector.

use super::{ClassifierError, LanguageClassifier, Prediction};
use async_trait::async_trait;
use whatlang::{Detector, Lang};

pub struct WhatlangClassifier {
    allowlist: Vec<String>,
    detector: Option<Detector>,
}

impl WhatlangClassifier {
    /// `allowlist` holds ISO 639-3 codes; empty means every supported language
    pub fn new(allowlist: Vec<String>) -> Self {
        Self {
            allowlist,
            detector: None,
        }
    }
}

#[async_trait]
impl LanguageClassifier for WhatlangClassifier {
    fn name(&self) -> &str {
        "whatlang"
    }

    async fn load(&mut self) -> Result<(), ClassifierError> {
        let mut langs = Vec::with_capacity(self.allowlist.len());
        for code in &self.allowlist {
            let lang = Lang::from_code(code.trim()).ok_or_else(|| {
                ClassifierError::InitializationFailed(format!(
                    "unsupported language code '{}' in allowlist",
                    code
                ))
            })?;
            langs.push(lang);
        }

        let detector = if langs.is_empty() {
            Detector::new()
        } else {
            Detector::with_allowlist(langs)
        };

        tracing::info!(
            allowlist = ?self.allowlist,
            "whatlang detector ready"
        );
        self.detector = Some(detector);
        Ok(())
    }

    async fn predict(&self, text: &str, k: usize) -> Result<Vec<Prediction>, ClassifierError> {
        let detector = self.detector.as_ref().ok_or(ClassifierError::NotLoaded)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        // whatlang only reports its best guess
        Ok(detector
            .detect(text)
            .map(|info| Prediction {
                label: info.lang().code().to_string(),
                confidence: info.confidence(),
            })
            .into_iter()
            .collect())
    }
}
