// Analysis Pipeline
// Segment -> per-sentence detector calls (bounded fan-out) -> aggregate -> score & summarize

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::{AnalysisReport, AnalysisResult, Article, Assessment, TextSpan};
use crate::services::config_store::{DetectorKind, EngineConfig};
use crate::services::lexicon::{LexiconError, LexiconStore};
use crate::services::providers::{
    get_api_key, HashingEmbedder, HttpEmbedder, HttpSubjectivityClassifier, NlpError,
    SentenceEmbedder, HF_PROVIDER,
};
use crate::services::sentence_segmenter::{segment_sentences, Sentence};
use crate::services::text_processor::word_count;

use super::aggregation::{aggregate_segments, Placement};
use super::detector::BiasDetector;
use super::embedding::{EmbeddingDetector, ReferenceSet};
use super::hybrid::HybridDetector;
use super::lexicon_detector::LexiconDetector;
use super::model_based::ModelDetector;
use super::scoring::{classify_tier, overall_score, SummaryProfile};
use super::statistical::StatisticalDetector;

const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("lexicon error: {0}")]
    Lexicon(#[from] LexiconError),
    #[error("reference sentences error: {0}")]
    References(#[from] serde_json::Error),
    #[error("NLP adapter error: {0}")]
    Nlp(#[from] NlpError),
}

pub struct BiasEngine {
    detector: Arc<dyn BiasDetector>,
    lexicon: Arc<LexiconStore>,
    concurrency: usize,
    placement: Placement,
}

impl BiasEngine {
    pub fn new(detector: Arc<dyn BiasDetector>) -> Self {
        Self {
            detector,
            lexicon: LexiconStore::shared(),
            concurrency: DEFAULT_CONCURRENCY,
            placement: Placement::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_lexicon(mut self, lexicon: Arc<LexiconStore>) -> Self {
        self.lexicon = lexicon;
        self
    }

    /// Build the configured detector, connecting remote NLP adapters where needed.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let detector = build_detector(config).await?;
        Ok(Self::new(detector)
            .with_concurrency(config.concurrency)
            .with_placement(config.placement))
    }

    pub fn detector(&self) -> &dyn BiasDetector {
        self.detector.as_ref()
    }

    /// Detector findings placed on the article, with the document score.
    pub async fn execute(&self, article: &Article) -> AnalysisResult {
        self.analyze(article).await.result
    }

    pub async fn analyze(&self, article: &Article) -> AnalysisReport {
        let started = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let content = article.content.as_str();
        let sentences: Vec<Sentence<'_>> = segment_sentences(content).collect();

        info!(
            "[PIPELINE] analyze start request_id={} detector={} sentences={} chars={}",
            request_id,
            self.detector.name(),
            sentences.len(),
            content.chars().count()
        );

        let (assessments, degraded_sentences) = if self.detector.is_ready() {
            self.assess_all(&sentences).await
        } else {
            warn!(
                "[PIPELINE] detector {} not ready, returning no findings",
                self.detector.name()
            );
            (vec![Assessment::clear(); sentences.len()], 0)
        };

        let findings = sentences
            .iter()
            .zip(assessments)
            .filter_map(|(sentence, assessment)| {
                let mut finding = assessment.finding?;
                if finding.text == sentence.text {
                    finding.span = Some(TextSpan::new(sentence.start, sentence.end));
                }
                Some(finding)
            })
            .collect();

        let segments = aggregate_segments(content, findings, self.placement);
        let profile: SummaryProfile = self.detector.summary_profile();
        let tier = classify_tier(&segments, &profile.cutoffs);
        let summary = self.detector.summarize(&segments);
        let score = overall_score(&segments, content);
        let flagged_terms = self.lexicon.scan_terms(content);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "[PIPELINE] analyze done request_id={} segments={} overall_score={:.3} tier={} degraded={} elapsed_ms={}",
            request_id,
            segments.len(),
            score,
            tier.as_str(),
            degraded_sentences,
            elapsed_ms
        );

        AnalysisReport {
            request_id,
            result: AnalysisResult {
                segments,
                overall_score: score,
                article_title: article.title.clone(),
            },
            summary,
            tier,
            detector: self.detector.name().to_string(),
            word_count: word_count(content),
            sentence_count: sentences.len(),
            degraded_sentences,
            flagged_terms,
            source_url: article.source_url.clone(),
            analyzed_at: chrono::Utc::now(),
            elapsed_ms,
        }
    }

    /// One assessment per sentence, in document order, plus the degraded count.
    async fn assess_all(&self, sentences: &[Sentence<'_>]) -> (Vec<Assessment>, usize) {
        if sentences.is_empty() {
            return (Vec::new(), 0);
        }

        let batch_size = self.detector.batch_size().max(1);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<(usize, Vec<Assessment>)> = JoinSet::new();
        let mut batches = 0usize;

        for (batch_idx, chunk) in sentences.chunks(batch_size).enumerate() {
            let texts: Vec<String> = chunk.iter().map(|s| s.text.to_string()).collect();
            let detector = self.detector.clone();
            let semaphore = semaphore.clone();
            batches += 1;

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (batch_idx, vec![Assessment::degraded(); texts.len()]);
                };
                (batch_idx, detector.assess_batch(&texts).await)
            });
        }

        let mut slots: Vec<Option<Vec<Assessment>>> = vec![None; batches];
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((batch_idx, assessments)) => slots[batch_idx] = Some(assessments),
                Err(e) => warn!("[PIPELINE] detector task failed: {}", e),
            }
        }

        let mut out = Vec::with_capacity(sentences.len());
        for (slot, chunk) in slots.into_iter().zip(sentences.chunks(batch_size)) {
            match slot {
                Some(mut assessments) => {
                    assessments.resize_with(chunk.len(), Assessment::degraded);
                    out.extend(assessments);
                }
                None => out.extend(chunk.iter().map(|_| Assessment::degraded())),
            }
        }

        let degraded = out.iter().filter(|a| a.degraded).count();
        (out, degraded)
    }
}

/// Construct the detector named by `config.detector`.
pub async fn build_detector(config: &EngineConfig) -> Result<Arc<dyn BiasDetector>, EngineError> {
    let store = LexiconStore::shared();
    let subjectivity = SummaryProfile::subjectivity().with_cutoffs(config.tiers.subjectivity);

    let detector: Arc<dyn BiasDetector> = match config.detector {
        DetectorKind::Lexicon => Arc::new(
            LexiconDetector::for_categories(store, &config.lexicon_priority)?
                .with_summary_profile(subjectivity),
        ),
        DetectorKind::Statistical => Arc::new(
            StatisticalDetector::new(config.thresholds.statistical).with_summary_profile(subjectivity),
        ),
        DetectorKind::Model => Arc::new(build_model_detector(config).await.with_summary_profile(subjectivity)),
        DetectorKind::Embedding => {
            let embedder: Arc<dyn SentenceEmbedder> = if config.embedder.enabled {
                Arc::new(HttpEmbedder::new(&config.embedder, get_api_key(HF_PROVIDER))?)
            } else {
                info!("[PIPELINE] remote embedder disabled, using offline hashing embedder");
                Arc::new(HashingEmbedder::default())
            };
            let references = ReferenceSet::bundled()?;
            Arc::new(
                EmbeddingDetector::new(embedder, &references, config.call_timeout())
                    .await
                    .with_threshold(config.thresholds.embedding)
                    .with_summary_profile(SummaryProfile::semantic().with_cutoffs(config.tiers.semantic)),
            )
        }
        DetectorKind::Hybrid => {
            let model: Option<Arc<dyn BiasDetector>> = if config.hybrid.use_model && config.classifier.enabled {
                Some(Arc::new(build_model_detector(config).await))
            } else {
                None
            };
            Arc::new(
                HybridDetector::standard(store, model, &config.hybrid)?.with_summary_profile(subjectivity),
            )
        }
    };

    info!(
        "[PIPELINE] detector built: name={} ready={} threshold={}",
        detector.name(),
        detector.is_ready(),
        detector.threshold()
    );
    Ok(detector)
}

async fn build_model_detector(config: &EngineConfig) -> ModelDetector {
    let classifier = HttpSubjectivityClassifier::connect(&config.classifier, get_api_key(HF_PROVIDER)).await;
    ModelDetector::new(Arc::new(classifier))
        .with_threshold(config.thresholds.model)
        .with_call_timeout(config.call_timeout())
}
