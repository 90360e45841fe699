// Detector capability
// Common contract for every bias detector variant

use async_trait::async_trait;

use crate::models::{Assessment, BiasSegment};
use crate::services::sentence_segmenter::segment_sentences;

use super::scoring::{summarize_segments, SummaryProfile};

#[async_trait]
pub trait BiasDetector: Send + Sync {
    fn name(&self) -> &str;

    fn threshold(&self) -> f64;

    /// `false` when a capability the detector depends on failed to initialize.
    fn is_ready(&self) -> bool {
        true
    }

    fn summary_profile(&self) -> SummaryProfile {
        SummaryProfile::subjectivity()
    }

    /// Number of sentences this detector prefers to receive per `assess_batch` call.
    fn batch_size(&self) -> usize {
        1
    }

    /// Judge one sentence. `sentence` is returned verbatim as the finding text.
    async fn assess(&self, sentence: &str) -> Assessment;

    async fn assess_batch(&self, sentences: &[String]) -> Vec<Assessment> {
        let mut out = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            out.push(self.assess(sentence).await);
        }
        out
    }

    /// Findings for every sentence of `text`, in document order.
    async fn detect(&self, text: &str) -> Vec<BiasSegment> {
        if !self.is_ready() {
            return Vec::new();
        }
        let sentences: Vec<String> = segment_sentences(text).map(|s| s.text.to_string()).collect();
        if sentences.is_empty() {
            return Vec::new();
        }
        self.assess_batch(&sentences)
            .await
            .into_iter()
            .filter_map(|a| a.finding)
            .collect()
    }

    fn summarize(&self, segments: &[BiasSegment]) -> String {
        summarize_segments(segments, &self.summary_profile())
    }
}
