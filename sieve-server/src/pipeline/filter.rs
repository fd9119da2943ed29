//! Length and language filtering
//!
//! Segments are processed strictly in index order. Each one ends in exactly
//! one [`SegmentDecision`] and exactly one progress event. A classifier
//! failure rejects that segment only; the run carries on.

use super::emitter::{ProgressEmitter, ProgressState};
use super::segmenter::Segment;
use crate::classifier::{ClassifierError, LanguageClassifier};
use sieve_common::config::PipelineSettings;
use sieve_common::SieveEvent;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Acceptance rules
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub min_length: usize,
    pub classify_prefix_chars: usize,
    pub target_language: String,
    pub min_confidence: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for FilterConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            min_length: settings.min_length,
            classify_prefix_chars: settings.classify_prefix_chars,
            target_language: settings.target_language.clone(),
            min_confidence: settings.min_confidence,
        }
    }
}

/// Outcome for one segment
#[derive(Debug)]
pub enum SegmentDecision {
    Accepted,
    /// Below `min_length`; the classifier was not consulted
    TooShort,
    /// Classified as another language, or below the confidence floor
    Rejected { label: Option<String> },
    Failed(ClassifierError),
}

impl SegmentDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SegmentDecision::Accepted)
    }
}

/// A segment that passed every check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedPrompt {
    pub index: usize,
    pub text: String,
}

/// Why a filter pass ended before the last segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    SinkClosed,
    TimedOut,
}

/// Result of one filter pass
#[derive(Debug)]
pub struct FilterOutcome {
    /// Accepted prompts, ordered by segment index
    pub accepted: Vec<AcceptedPrompt>,
    pub progress: ProgressState,
    /// None when every segment was processed
    pub stopped: Option<StopReason>,
}

pub struct FilterPipeline {
    config: FilterConfig,
    classifier: Arc<dyn LanguageClassifier>,
}

enum Step {
    Decided(SegmentDecision),
    Stopped(StopReason),
}

impl FilterPipeline {
    pub fn new(config: FilterConfig, classifier: Arc<dyn LanguageClassifier>) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Decide a single segment
    pub async fn classify_segment(&self, segment: &Segment) -> SegmentDecision {
        if segment.length < self.config.min_length {
            return SegmentDecision::TooShort;
        }

        let sample = char_prefix(&segment.content, self.config.classify_prefix_chars);
        match self.classifier.predict(sample, 1).await {
            Ok(predictions) => match predictions.into_iter().next() {
                Some(top)
                    if top.label == self.config.target_language
                        && top.confidence >= self.config.min_confidence =>
                {
                    SegmentDecision::Accepted
                }
                Some(top) => SegmentDecision::Rejected {
                    label: Some(top.label),
                },
                None => SegmentDecision::Rejected { label: None },
            },
            Err(e) => SegmentDecision::Failed(e),
        }
    }

    /// Process every segment in order, emitting one progress event each
    ///
    /// Stops early only when `cancel` fires, the event receiver disappears,
    /// or `deadline` passes.
    pub async fn run(
        &self,
        segments: &[Segment],
        emitter: &mut ProgressEmitter,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> FilterOutcome {
        let mut progress = ProgressState::new(segments.len());
        let mut accepted = Vec::new();
        let mut stopped = None;

        for segment in segments {
            if cancel.is_cancelled() {
                stopped = Some(StopReason::Cancelled);
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                stopped = Some(StopReason::TimedOut);
                break;
            }

            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Stopped(StopReason::Cancelled),
                _ = deadline_reached(deadline) => Step::Stopped(StopReason::TimedOut),
                decision = self.classify_segment(segment) => Step::Decided(decision),
            };

            let decision = match step {
                Step::Decided(decision) => decision,
                Step::Stopped(reason) => {
                    stopped = Some(reason);
                    break;
                }
            };

            match &decision {
                SegmentDecision::Accepted => {
                    debug!(segment = segment.index, "Segment accepted");
                    accepted.push(AcceptedPrompt {
                        index: segment.index,
                        text: segment.content.clone(),
                    });
                }
                SegmentDecision::TooShort => {
                    debug!(segment = segment.index, length = segment.length, "Segment too short");
                }
                SegmentDecision::Rejected { label } => {
                    debug!(segment = segment.index, label = ?label, "Segment rejected");
                }
                SegmentDecision::Failed(e) => {
                    warn!(segment = segment.index, error = %e, "Classification failed");
                    let event = SieveEvent::segment_error(
                        segment.index,
                        format!("Failed to classify prompt {}: {}", segment.index, e),
                    );
                    if !emitter.emit(event).await {
                        stopped = Some(StopReason::SinkClosed);
                        break;
                    }
                }
            }

            progress.record(decision.is_accepted());
            if !emitter.emit(progress.to_event()).await {
                stopped = Some(StopReason::SinkClosed);
                break;
            }
        }

        accepted.sort_by_key(|prompt| prompt.index);

        FilterOutcome {
            accepted,
            progress,
            stopped,
        }
    }
}

/// First `max_chars` characters of `text`, on a char boundary
fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Prediction;
    use crate::pipeline::segmenter::segment;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Labels text "fra" when it contains "bonjour", "eng" otherwise;
    /// fails on "explode"
    struct KeywordClassifier {
        seen: Mutex<Vec<String>>,
        confidence: f64,
    }

    impl KeywordClassifier {
        fn new(confidence: f64) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                confidence,
            }
        }
    }

    #[async_trait]
    impl LanguageClassifier for KeywordClassifier {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn load(&mut self) -> Result<(), ClassifierError> {
            Ok(())
        }

        async fn predict(&self, text: &str, _k: usize) -> Result<Vec<Prediction>, ClassifierError> {
            self.seen.lock().unwrap().push(text.to_string());
            let lower = text.to_lowercase();
            if lower.contains("explode") {
                return Err(ClassifierError::PredictionFailed("model crashed".to_string()));
            }
            let label = if lower.contains("bonjour") { "fra" } else { "eng" };
            Ok(vec![Prediction {
                label: label.to_string(),
                confidence: self.confidence,
            }])
        }
    }

    fn pipeline(config: FilterConfig, confidence: f64) -> (FilterPipeline, Arc<KeywordClassifier>) {
        let classifier = Arc::new(KeywordClassifier::new(confidence));
        (FilterPipeline::new(config, classifier.clone()), classifier)
    }

    fn long(text: &str) -> String {
        format!("{} with enough padding to clear the minimum length rule", text)
    }

    async fn collect(mut rx: mpsc::Receiver<SieveEvent>) -> Vec<SieveEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_char_prefix_respects_boundaries() {
        assert_eq!(char_prefix("héllo", 2), "hé");
        assert_eq!(char_prefix("abc", 10), "abc");
        assert_eq!(char_prefix("abc", 0), "");
    }

    #[tokio::test]
    async fn test_short_segment_never_classified() {
        let (pipeline, classifier) = pipeline(FilterConfig::default(), 1.0);
        let segments = segment("Prompt\nshort english\n");

        let decision = pipeline.classify_segment(&segments[0]).await;
        assert!(matches!(decision, SegmentDecision::TooShort));
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_cap_applied() {
        let config = FilterConfig {
            classify_prefix_chars: 10,
            ..FilterConfig::default()
        };
        let (pipeline, classifier) = pipeline(config, 1.0);
        let segments = segment(&format!("Prompt\n{}\n", long("abcdefghijklmnop")));

        pipeline.classify_segment(&segments[0]).await;
        assert_eq!(classifier.seen.lock().unwrap()[0], "abcdefghij");
    }

    #[tokio::test]
    async fn test_confidence_floor() {
        let config = FilterConfig {
            min_confidence: 0.8,
            ..FilterConfig::default()
        };
        let (pipeline, _) = pipeline(config, 0.5);
        let segments = segment(&format!("Prompt\n{}\n", long("english text")));

        let decision = pipeline.classify_segment(&segments[0]).await;
        assert!(matches!(
            decision,
            SegmentDecision::Rejected { label: Some(ref l) } if l == "eng"
        ));
    }

    #[tokio::test]
    async fn test_run_emits_progress_per_segment_and_survives_failure() {
        let (pipeline, _) = pipeline(FilterConfig::default(), 1.0);
        let text = format!(
            "Prompt 1\n{}\nPrompt 2\n{}\nPrompt 3\ntiny\nPrompt 4\n{}\n",
            long("first english"),
            long("this one will explode"),
            long("bonjour le monde"),
        );
        let segments = segment(&text);
        assert_eq!(segments.len(), 4);

        let (tx, rx) = mpsc::channel(32);
        let mut emitter = ProgressEmitter::new(tx, Duration::ZERO);
        let outcome = pipeline
            .run(&segments, &mut emitter, &CancellationToken::new(), None)
            .await;
        drop(emitter);

        assert!(outcome.stopped.is_none());
        assert_eq!(outcome.progress.processed, 4);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].index, 0);

        let events = collect(rx).await;
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SieveEvent::Progress { processed, .. } => Some(*processed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2, 3, 4]);

        // Error event for segment 1 comes before its progress event
        assert!(matches!(events[1], SieveEvent::Error { segment: Some(1), .. }));
        assert!(matches!(events[2], SieveEvent::Progress { processed: 2, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_classifying() {
        let (pipeline, classifier) = pipeline(FilterConfig::default(), 1.0);
        let segments = segment(&format!("Prompt\n{}\n", long("english")));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut emitter = ProgressEmitter::detached();
        let outcome = pipeline.run(&segments, &mut emitter, &cancel, None).await;

        assert_eq!(outcome.stopped, Some(StopReason::Cancelled));
        assert_eq!(outcome.progress.processed, 0);
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_elapsed_deadline_times_out() {
        let (pipeline, _) = pipeline(FilterConfig::default(), 1.0);
        let segments = segment(&format!("Prompt\n{}\n", long("english")));

        let mut emitter = ProgressEmitter::detached();
        let outcome = pipeline
            .run(
                &segments,
                &mut emitter,
                &CancellationToken::new(),
                Some(Instant::now()),
            )
            .await;

        assert_eq!(outcome.stopped, Some(StopReason::TimedOut));
    }

    #[tokio::test]
    async fn test_closed_sink_stops_run() {
        let (pipeline, classifier) = pipeline(FilterConfig::default(), 1.0);
        let text = format!(
            "Prompt\n{}\nPrompt\n{}\n",
            long("first english"),
            long("second english")
        );
        let segments = segment(&text);

        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut emitter = ProgressEmitter::new(tx, Duration::ZERO);
        let outcome = pipeline
            .run(&segments, &mut emitter, &CancellationToken::new(), None)
            .await;

        assert_eq!(outcome.stopped, Some(StopReason::SinkClosed));
        assert_eq!(classifier.seen.lock().unwrap().len(), 1);
    }
}
