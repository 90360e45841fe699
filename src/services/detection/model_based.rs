// Model-Based Subjectivity Detector
// Delegates each sentence to a subjectivity classifier under a per-call deadline

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::models::{Assessment, BiasSegment};
use crate::services::providers::{with_deadline, SubjectivityClassifier, SubjectivityLabel};
use crate::services::text_processor::preview;

use super::detector::BiasDetector;
use super::scoring::SummaryProfile;

pub const DEFAULT_MODEL_THRESHOLD: f64 = 0.4;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ModelDetector {
    classifier: Arc<dyn SubjectivityClassifier>,
    threshold: f64,
    call_timeout: Duration,
    profile: SummaryProfile,
}

impl ModelDetector {
    pub fn new(classifier: Arc<dyn SubjectivityClassifier>) -> Self {
        Self {
            classifier,
            threshold: DEFAULT_MODEL_THRESHOLD,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            profile: SummaryProfile::subjectivity(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_summary_profile(mut self, profile: SummaryProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[async_trait]
impl BiasDetector for ModelDetector {
    fn name(&self) -> &str {
        "model"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn is_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    fn summary_profile(&self) -> SummaryProfile {
        self.profile
    }

    async fn assess(&self, sentence: &str) -> Assessment {
        if !self.is_ready() {
            return Assessment::clear();
        }

        let judgment = match with_deadline(self.call_timeout, self.classifier.classify(sentence)).await {
            Ok(j) => j,
            Err(e) => {
                warn!(
                    "[MODEL_DETECTOR] classify failed model={} sentence='{}': {}",
                    self.classifier.model_id(),
                    preview(sentence, 60),
                    e
                );
                return Assessment::degraded();
            }
        };

        if judgment.label != SubjectivityLabel::Subjective || judgment.confidence <= self.threshold {
            return Assessment::clear();
        }

        let confidence = (judgment.confidence * 100.0).round() / 100.0;
        Assessment::flagged(BiasSegment::new(
            sentence,
            format!("Subjective Language (Model Confidence: {:.2})", confidence),
            Some(confidence),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{NlpError, SubjectivityJudgment};

    struct FixedClassifier {
        label: SubjectivityLabel,
        confidence: f64,
        ready: bool,
    }

    #[async_trait]
    impl SubjectivityClassifier for FixedClassifier {
        fn model_id(&self) -> &str {
            "fixed"
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn classify(&self, _sentence: &str) -> Result<SubjectivityJudgment, NlpError> {
            Ok(SubjectivityJudgment {
                label: self.label,
                confidence: self.confidence,
            })
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl SubjectivityClassifier for FailingClassifier {
        fn model_id(&self) -> &str {
            "failing"
        }

        async fn classify(&self, _sentence: &str) -> Result<SubjectivityJudgment, NlpError> {
            Err(NlpError::ApiError {
                status: 503,
                message: "loading".to_string(),
            })
        }
    }

    struct SlowClassifier;

    #[async_trait]
    impl SubjectivityClassifier for SlowClassifier {
        fn model_id(&self) -> &str {
            "slow"
        }

        async fn classify(&self, _sentence: &str) -> Result<SubjectivityJudgment, NlpError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(SubjectivityJudgment {
                label: SubjectivityLabel::Subjective,
                confidence: 0.99,
            })
        }
    }

    fn fixed(label: SubjectivityLabel, confidence: f64) -> ModelDetector {
        ModelDetector::new(Arc::new(FixedClassifier {
            label,
            confidence,
            ready: true,
        }))
    }

    #[tokio::test]
    async fn test_subjective_above_threshold_is_flagged() {
        let detector = fixed(SubjectivityLabel::Subjective, 0.8666);
        let seg = detector.assess("What a stunning triumph.").await.finding.unwrap();
        assert_eq!(seg.score, Some(0.87));
        assert_eq!(seg.reason, "Subjective Language (Model Confidence: 0.87)");
        assert_eq!(seg.text, "What a stunning triumph.");
    }

    #[tokio::test]
    async fn test_neutral_label_is_never_flagged() {
        let detector = fixed(SubjectivityLabel::Neutral, 0.99);
        assert!(detector
            .detect("The committee reviewed the budget on Tuesday.")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let at = fixed(SubjectivityLabel::Subjective, 0.4);
        assert!(at.assess("Sentence.").await.finding.is_none());
        let above = fixed(SubjectivityLabel::Subjective, 0.41);
        assert!(above.assess("Sentence.").await.finding.is_some());
    }

    #[tokio::test]
    async fn test_unready_classifier_yields_nothing() {
        let detector = ModelDetector::new(Arc::new(FixedClassifier {
            label: SubjectivityLabel::Subjective,
            confidence: 0.99,
            ready: false,
        }));
        assert!(!detector.is_ready());
        assert!(detector.detect("Amazing. Wonderful.").await.is_empty());
        let assessment = detector.assess("Amazing.").await;
        assert!(assessment.finding.is_none());
        assert!(!assessment.degraded);
    }

    #[tokio::test]
    async fn test_errors_and_timeouts_degrade() {
        let failing = ModelDetector::new(Arc::new(FailingClassifier));
        let assessment = failing.assess("Anything.").await;
        assert!(assessment.degraded);
        assert!(assessment.finding.is_none());

        let slow = ModelDetector::new(Arc::new(SlowClassifier))
            .with_call_timeout(Duration::from_millis(20));
        let assessment = slow.assess("Anything.").await;
        assert!(assessment.degraded);
        assert!(assessment.finding.is_none());
    }
}
