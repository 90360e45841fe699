// Embedding-Similarity Detector
// bias_score = max cosine to biased references - max cosine to neutral references

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::models::{Assessment, BiasSegment};
use crate::services::providers::{max_cosine_similarity, with_deadline, NlpError, SentenceEmbedder};

use super::detector::BiasDetector;
use super::scoring::SummaryProfile;

pub const DEFAULT_EMBEDDING_THRESHOLD: f64 = 0.6;
const EMBED_BATCH_SIZE: usize = 32;

/// Curated example sentences the embedding detector compares against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub biased: Vec<String>,
    pub neutral: Vec<String>,
}

impl ReferenceSet {
    pub fn bundled() -> Result<Self, serde_json::Error> {
        serde_json::from_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/reference_sentences.json"
        )))
    }
}

pub struct EmbeddingDetector {
    embedder: Arc<dyn SentenceEmbedder>,
    biased: Vec<Vec<f32>>,
    neutral: Vec<Vec<f32>>,
    ready: bool,
    threshold: f64,
    call_timeout: Duration,
    profile: SummaryProfile,
}

impl EmbeddingDetector {
    /// Embeds the reference sets once. Any failure leaves the detector not ready for good.
    pub async fn new(
        embedder: Arc<dyn SentenceEmbedder>,
        references: &ReferenceSet,
        call_timeout: Duration,
    ) -> Self {
        let mut detector = Self {
            embedder,
            biased: Vec::new(),
            neutral: Vec::new(),
            ready: false,
            threshold: DEFAULT_EMBEDDING_THRESHOLD,
            call_timeout,
            profile: SummaryProfile::semantic(),
        };

        if !detector.embedder.is_ready() {
            warn!(
                "[EMBEDDING_DETECTOR] embedder {} not ready, detector disabled",
                detector.embedder.model_id()
            );
            return detector;
        }
        if references.biased.is_empty() || references.neutral.is_empty() {
            warn!("[EMBEDDING_DETECTOR] empty reference set, detector disabled");
            return detector;
        }

        let start = Instant::now();
        match detector.embed_references(references).await {
            Ok((biased, neutral)) => {
                info!(
                    "[EMBEDDING_DETECTOR] references embedded: model={}, biased={}, neutral={}, elapsed_ms={}",
                    detector.embedder.model_id(),
                    biased.len(),
                    neutral.len(),
                    start.elapsed().as_millis()
                );
                detector.biased = biased;
                detector.neutral = neutral;
                detector.ready = true;
            }
            Err(e) => {
                warn!(
                    "[EMBEDDING_DETECTOR] reference embedding failed, model={}: {}",
                    detector.embedder.model_id(),
                    e
                );
            }
        }
        detector
    }

    async fn embed_references(
        &self,
        references: &ReferenceSet,
    ) -> Result<(Vec<Vec<f32>>, Vec<Vec<f32>>), NlpError> {
        let biased = self.embed_checked(&references.biased).await?;
        let neutral = self.embed_checked(&references.neutral).await?;
        Ok((biased, neutral))
    }

    async fn embed_checked(&self, sentences: &[String]) -> Result<Vec<Vec<f32>>, NlpError> {
        let vectors = with_deadline(self.call_timeout, self.embedder.embed(sentences)).await?;
        if vectors.len() != sentences.len() {
            return Err(NlpError::MalformedResponse(format!(
                "expected {} vectors, got {}",
                sentences.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_summary_profile(mut self, profile: SummaryProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Raw, unclamped score for one embedded sentence.
    pub fn bias_score(&self, vector: &[f32]) -> Option<f64> {
        let biased = max_cosine_similarity(vector, &self.biased)?;
        let neutral = max_cosine_similarity(vector, &self.neutral)?;
        Some(biased - neutral)
    }

    fn judge(&self, sentence: &str, vector: &[f32]) -> Assessment {
        let Some(raw) = self.bias_score(vector) else {
            return Assessment::clear();
        };
        if raw <= self.threshold {
            return Assessment::clear();
        }
        let rounded = (raw * 1000.0).round() / 1000.0;
        Assessment::flagged(BiasSegment::new(
            sentence,
            format!("Embedding bias score: {:.3}", rounded),
            Some(rounded.clamp(0.0, 1.0)),
        ))
    }
}

#[async_trait]
impl BiasDetector for EmbeddingDetector {
    fn name(&self) -> &str {
        "embedding"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn summary_profile(&self) -> SummaryProfile {
        self.profile
    }

    fn batch_size(&self) -> usize {
        EMBED_BATCH_SIZE
    }

    async fn assess(&self, sentence: &str) -> Assessment {
        self.assess_batch(&[sentence.to_string()])
            .await
            .pop()
            .unwrap_or_default()
    }

    async fn assess_batch(&self, sentences: &[String]) -> Vec<Assessment> {
        if !self.ready {
            return vec![Assessment::clear(); sentences.len()];
        }
        if sentences.is_empty() {
            return Vec::new();
        }

        match self.embed_checked(sentences).await {
            Ok(vectors) => sentences
                .iter()
                .zip(vectors.iter())
                .map(|(sentence, vector)| self.judge(sentence, vector))
                .collect(),
            Err(e) => {
                warn!(
                    "[EMBEDDING_DETECTOR] embed failed for {} sentences, model={}: {}",
                    sentences.len(),
                    self.embedder.model_id(),
                    e
                );
                vec![Assessment::degraded(); sentences.len()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::HashingEmbedder;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Looks sentences up in a fixed table; unknown sentences map to `fallback`.
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
        fallback: Vec<f32>,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(entries: &[(&str, [f32; 2])]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                fallback: vec![0.0, 1.0],
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SentenceEmbedder for TableEmbedder {
        fn model_id(&self) -> &str {
            "table"
        }

        async fn embed(&self, sentences: &[String]) -> Result<Vec<Vec<f32>>, NlpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(sentences
                .iter()
                .map(|s| self.table.get(s).cloned().unwrap_or_else(|| self.fallback.clone()))
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl SentenceEmbedder for BrokenEmbedder {
        fn model_id(&self) -> &str {
            "broken"
        }

        async fn embed(&self, _sentences: &[String]) -> Result<Vec<Vec<f32>>, NlpError> {
            Err(NlpError::Unavailable("no model".to_string()))
        }
    }

    fn toy_refs() -> ReferenceSet {
        ReferenceSet {
            biased: vec!["B".to_string()],
            neutral: vec!["N".to_string()],
        }
    }

    fn toy_embedder() -> Arc<TableEmbedder> {
        Arc::new(TableEmbedder::new(&[
            ("B", [1.0, 0.0]),
            ("N", [0.0, 1.0]),
            ("Loaded claim.", [1.0, 0.0]),
            ("Leaning claim.", [1.0, 1.0]),
        ]))
    }

    #[test]
    fn test_bundled_references_load() {
        let refs = ReferenceSet::bundled().unwrap();
        assert!(!refs.biased.is_empty());
        assert!(refs
            .neutral
            .iter()
            .any(|s| s == "The committee met on Monday to review the annual budget."));
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let embedder = toy_embedder();
        let at = EmbeddingDetector::new(embedder.clone(), &toy_refs(), Duration::from_secs(1))
            .await
            .with_threshold(1.0);
        assert!(at.is_ready());
        assert!(at.assess("Loaded claim.").await.finding.is_none());

        let below = EmbeddingDetector::new(embedder, &toy_refs(), Duration::from_secs(1))
            .await
            .with_threshold(0.99);
        let seg = below.assess("Loaded claim.").await.finding.unwrap();
        assert_eq!(seg.score, Some(1.0));
        assert_eq!(seg.reason, "Embedding bias score: 1.000");
    }

    #[tokio::test]
    async fn test_neutral_leaning_sentence_is_clear() {
        let detector = EmbeddingDetector::new(toy_embedder(), &toy_refs(), Duration::from_secs(1)).await;
        // Equal similarity to both sets: score 0.
        assert!(detector.assess("Leaning claim.").await.finding.is_none());
        // Unknown sentences map onto the neutral reference.
        assert!(detector.assess("Something else.").await.finding.is_none());
    }

    #[tokio::test]
    async fn test_detect_embeds_document_in_one_call() {
        let embedder = toy_embedder();
        let detector = EmbeddingDetector::new(embedder.clone(), &toy_refs(), Duration::from_secs(1))
            .await
            .with_threshold(0.5);
        let before = embedder.calls.load(Ordering::SeqCst);
        let segments = detector
            .detect("Loaded claim. Something else. Loaded claim.")
            .await;
        assert_eq!(embedder.calls.load(Ordering::SeqCst) - before, 1);
        assert_eq!(segments.len(), 2);
    }

    #[tokio::test]
    async fn test_reference_failure_disables_detector() {
        let detector =
            EmbeddingDetector::new(Arc::new(BrokenEmbedder), &toy_refs(), Duration::from_secs(1)).await;
        assert!(!detector.is_ready());
        assert!(detector.detect("Loaded claim.").await.is_empty());

        let empty = ReferenceSet {
            biased: Vec::new(),
            neutral: vec!["N".to_string()],
        };
        let detector = EmbeddingDetector::new(toy_embedder(), &empty, Duration::from_secs(1)).await;
        assert!(!detector.is_ready());
    }

    #[tokio::test]
    async fn test_hashing_embedder_with_bundled_references() {
        let refs = ReferenceSet::bundled().unwrap();
        let detector =
            EmbeddingDetector::new(Arc::new(HashingEmbedder::default()), &refs, Duration::from_secs(1)).await;
        assert!(detector.is_ready());
        assert!(detector
            .detect("The committee reviewed the budget on Tuesday.")
            .await
            .is_empty());

        let seg = detector
            .assess("The disastrous policy was an outrageous betrayal of ordinary people.")
            .await
            .finding
            .unwrap();
        assert!(seg.score.unwrap() > 0.6);
        assert!(seg.score.unwrap() <= 1.0);
        assert_eq!(detector.summarize(&[]), "Based on semantic analysis, the article appears to be neutral.");
    }
}
