// NLP Provider Service
// Subjectivity classification and sentence embedding capabilities.
// Remote adapters speak the Hugging Face Inference API; the hashing embedder runs offline.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::config_store::EndpointConfig;
use super::text_processor::{is_stopword, word_tokens};

pub const HF_PROVIDER: &str = "huggingface";

#[derive(Error, Debug)]
pub enum NlpError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectivityLabel {
    Subjective,
    Neutral,
}

impl SubjectivityLabel {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "SUBJECTIVE" | "SUBJ" => Some(Self::Subjective),
            "NEUTRAL" | "OBJECTIVE" | "OBJ" => Some(Self::Neutral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectivityJudgment {
    pub label: SubjectivityLabel,
    pub confidence: f64,
}

/// Sentence-level subjective/neutral classifier.
#[async_trait]
pub trait SubjectivityClassifier: Send + Sync {
    fn model_id(&self) -> &str;

    fn is_ready(&self) -> bool {
        true
    }

    async fn classify(&self, sentence: &str) -> Result<SubjectivityJudgment, NlpError>;
}

/// Maps sentences to fixed-length vectors comparable by cosine similarity.
#[async_trait]
pub trait SentenceEmbedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn is_ready(&self) -> bool {
        true
    }

    /// One vector per input sentence, same order.
    async fn embed(&self, sentences: &[String]) -> Result<Vec<Vec<f32>>, NlpError>;
}

/// Run a capability call under a deadline.
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T, NlpError>
where
    F: Future<Output = Result<T, NlpError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(NlpError::Timeout(limit)),
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= 0.0 || nb <= 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Highest cosine similarity against a reference set; `None` when the set is empty.
pub fn max_cosine_similarity(query: &[f32], references: &[Vec<f32>]) -> Option<f64> {
    references
        .iter()
        .map(|r| cosine_similarity(query, r))
        .fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
}

// ============ Offline embedder ============

/// Deterministic signed feature-hashing of content words, L2-normalized.
///
/// Not a semantic model; it lets the embedding detector run without a network
/// and gives lexical-overlap similarity against the reference sentences.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(1024)
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a; stable across toolchains so offline scores stay reproducible.
fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET_BASIS, |h, b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(8) }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn embed_one(&self, sentence: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        for token in word_tokens(sentence) {
            if is_stopword(&token) {
                continue;
            }
            let h = fnv1a(&token);
            let idx = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
        }
        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl SentenceEmbedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        "hashing-bow"
    }

    async fn embed(&self, sentences: &[String]) -> Result<Vec<Vec<f32>>, NlpError> {
        Ok(sentences.iter().map(|s| self.embed_one(s)).collect())
    }
}

// ============ Remote adapters ============

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationBody {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureBody {
    Pooled(Vec<Vec<f32>>),
    // Token-level output: mean-pool per sentence.
    Tokens(Vec<Vec<Vec<f32>>>),
}

fn pick_judgment(body: ClassificationBody) -> Result<SubjectivityJudgment, NlpError> {
    let scores = match body {
        ClassificationBody::Nested(mut outer) => {
            if outer.is_empty() {
                Vec::new()
            } else {
                outer.swap_remove(0)
            }
        }
        ClassificationBody::Flat(scores) => scores,
    };

    let scores: Vec<LabelScore> = scores.into_iter().filter(|s| s.score.is_finite()).collect();

    // The threshold applies to P(subjective), so read that entry whenever it is present.
    if let Some(subjective) = scores
        .iter()
        .find(|s| SubjectivityLabel::parse(&s.label) == Some(SubjectivityLabel::Subjective))
    {
        return Ok(SubjectivityJudgment {
            label: SubjectivityLabel::Subjective,
            confidence: subjective.score.clamp(0.0, 1.0),
        });
    }

    let best = scores
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| NlpError::MalformedResponse("no label scores".to_string()))?;

    let label = SubjectivityLabel::parse(&best.label)
        .ok_or_else(|| NlpError::MalformedResponse(format!("unknown label '{}'", best.label)))?;

    Ok(SubjectivityJudgment {
        label,
        confidence: best.score.clamp(0.0, 1.0),
    })
}

fn mean_pool(tokens: Vec<Vec<f32>>) -> Vec<f32> {
    let Some(width) = tokens.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut out = vec![0.0f32; width];
    for row in &tokens {
        for (o, v) in out.iter_mut().zip(row) {
            *o += *v;
        }
    }
    let n = tokens.len() as f32;
    out.iter_mut().for_each(|v| *v /= n);
    out
}

fn flatten_features(body: FeatureBody, expected: usize) -> Result<Vec<Vec<f32>>, NlpError> {
    let vectors = match body {
        FeatureBody::Pooled(v) => v,
        FeatureBody::Tokens(t) => t.into_iter().map(mean_pool).collect(),
    };
    if vectors.len() != expected {
        return Err(NlpError::MalformedResponse(format!(
            "expected {} vectors, got {}",
            expected,
            vectors.len()
        )));
    }
    if vectors.iter().any(|v| v.is_empty()) {
        return Err(NlpError::MalformedResponse("empty embedding vector".to_string()));
    }
    Ok(vectors)
}

/// Shared HTTP plumbing for inference endpoints.
struct InferenceClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl InferenceClient {
    fn new(url: String, timeout_secs: u64, api_key: Option<String>) -> Result<Self, NlpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, url, api_key })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, NlpError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NlpError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

pub fn classification_url(base_url: &str, model: &str) -> String {
    format!("{}/models/{}", base_url.trim_end_matches('/'), model)
}

pub fn feature_extraction_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/pipeline/feature-extraction/{}",
        base_url.trim_end_matches('/'),
        model
    )
}

const PROBE_SENTENCE: &str = "The committee met on Monday.";

pub struct HttpSubjectivityClassifier {
    http: InferenceClient,
    model: String,
    ready: bool,
}

impl HttpSubjectivityClassifier {
    pub fn new(endpoint: &EndpointConfig, api_key: Option<String>) -> Result<Self, NlpError> {
        let url = classification_url(&endpoint.base_url, &endpoint.model);
        Ok(Self {
            http: InferenceClient::new(url, endpoint.request_timeout_secs, api_key)?,
            model: endpoint.model.clone(),
            ready: endpoint.enabled,
        })
    }

    /// Build the adapter and probe the endpoint once; readiness reflects the probe.
    pub async fn connect(endpoint: &EndpointConfig, api_key: Option<String>) -> Self {
        let mut classifier = match Self::new(endpoint, api_key) {
            Ok(c) => c,
            Err(e) => {
                warn!("[NLP] classifier client build failed: {}", e);
                return Self::unavailable(&endpoint.model);
            }
        };
        if !classifier.ready {
            info!("[NLP] classifier disabled by config");
            return classifier;
        }

        let start = Instant::now();
        match classifier.request(PROBE_SENTENCE).await {
            Ok(_) => {
                info!(
                    "[NLP] classifier ready: model={}, probe_ms={}",
                    classifier.model,
                    start.elapsed().as_millis()
                );
            }
            Err(e) => {
                warn!("[NLP] classifier probe failed, model={}: {}", classifier.model, e);
                classifier.ready = false;
            }
        }
        classifier
    }

    fn unavailable(model: &str) -> Self {
        Self {
            http: InferenceClient {
                client: Client::new(),
                url: String::new(),
                api_key: None,
            },
            model: model.to_string(),
            ready: false,
        }
    }

    async fn request(&self, sentence: &str) -> Result<SubjectivityJudgment, NlpError> {
        let body = serde_json::json!({
            "inputs": sentence,
            "options": { "wait_for_model": true }
        });
        let response = self.http.post(&body).await?;
        let parsed: ClassificationBody = response
            .json()
            .await
            .map_err(|e| NlpError::MalformedResponse(e.to_string()))?;
        pick_judgment(parsed)
    }
}

#[async_trait]
impl SubjectivityClassifier for HttpSubjectivityClassifier {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn classify(&self, sentence: &str) -> Result<SubjectivityJudgment, NlpError> {
        if !self.ready {
            return Err(NlpError::Unavailable(self.model.clone()));
        }
        self.request(sentence).await
    }
}

pub struct HttpEmbedder {
    http: InferenceClient,
    model: String,
    enabled: bool,
}

impl HttpEmbedder {
    pub fn new(endpoint: &EndpointConfig, api_key: Option<String>) -> Result<Self, NlpError> {
        let url = feature_extraction_url(&endpoint.base_url, &endpoint.model);
        Ok(Self {
            http: InferenceClient::new(url, endpoint.request_timeout_secs, api_key)?,
            model: endpoint.model.clone(),
            enabled: endpoint.enabled,
        })
    }
}

#[async_trait]
impl SentenceEmbedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_ready(&self) -> bool {
        self.enabled
    }

    async fn embed(&self, sentences: &[String]) -> Result<Vec<Vec<f32>>, NlpError> {
        if !self.enabled {
            return Err(NlpError::Unavailable(self.model.clone()));
        }
        if sentences.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "inputs": sentences,
            "options": { "wait_for_model": true }
        });
        let start = Instant::now();
        let response = self.http.post(&body).await?;
        let parsed: FeatureBody = response
            .json()
            .await
            .map_err(|e| NlpError::MalformedResponse(e.to_string()))?;
        debug!(
            "[NLP] embedded {} sentences in {}ms",
            sentences.len(),
            start.elapsed().as_millis()
        );
        flatten_features(parsed, sentences.len())
    }
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str) -> Option<String> {
    let env_keys = match provider {
        HF_PROVIDER | "hf" => vec!["SLANTSCOPE_HF_API_KEY", "HF_API_TOKEN", "HUGGINGFACEHUB_API_TOKEN"],
        _ => vec![],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(config_dir) = super::ConfigStore::default_config_dir() {
        let store = super::ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key(provider) {
            return Some(key);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_max_cosine_similarity() {
        let refs = vec![vec![0.0, 1.0], vec![1.0, 1.0]];
        let best = max_cosine_similarity(&[1.0, 0.0], &refs).unwrap();
        assert!((best - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(max_cosine_similarity(&[1.0, 0.0], &[]), None);
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_one("The committee reviewed the budget.");
        let b = embedder.embed_one("The committee reviewed the budget.");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let empty = embedder.embed_one("the of and");
        assert!(empty.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_fnv1a_matches_reference_values() {
        assert_eq!(fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
        let embedder = HashingEmbedder::new(16);
        let bucket = (fnv1a("budget") % 16) as usize;
        let v = embedder.embed_one("budget");
        assert!((v[bucket].abs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pick_judgment_reads_subjective_entry() {
        let body: ClassificationBody = serde_json::from_str(
            r#"[[{"label":"NEUTRAL","score":0.13},{"label":"SUBJECTIVE","score":0.87}]]"#,
        )
        .unwrap();
        let judgment = pick_judgment(body).unwrap();
        assert_eq!(judgment.label, SubjectivityLabel::Subjective);
        assert!((judgment.confidence - 0.87).abs() < 1e-9);

        // A losing subjective score still carries through for the threshold check.
        let close: ClassificationBody = serde_json::from_str(
            r#"[[{"label":"SUBJECTIVE","score":0.45},{"label":"NEUTRAL","score":0.55}]]"#,
        )
        .unwrap();
        let judgment = pick_judgment(close).unwrap();
        assert_eq!(judgment.label, SubjectivityLabel::Subjective);
        assert!((judgment.confidence - 0.45).abs() < 1e-9);

        let flat: ClassificationBody =
            serde_json::from_str(r#"[{"label":"neutral","score":0.9}]"#).unwrap();
        assert_eq!(pick_judgment(flat).unwrap().label, SubjectivityLabel::Neutral);
    }

    #[test]
    fn test_pick_judgment_rejects_unknown_or_empty() {
        let body: ClassificationBody =
            serde_json::from_str(r#"[[{"label":"LABEL_7","score":0.9}]]"#).unwrap();
        assert!(matches!(pick_judgment(body), Err(NlpError::MalformedResponse(_))));
        let empty: ClassificationBody = serde_json::from_str("[[]]").unwrap();
        assert!(pick_judgment(empty).is_err());
    }

    #[test]
    fn test_feature_body_shapes() {
        let pooled: FeatureBody = serde_json::from_str("[[0.1,0.2],[0.3,0.4]]").unwrap();
        assert_eq!(flatten_features(pooled, 2).unwrap().len(), 2);

        let tokens: FeatureBody = serde_json::from_str("[[[1.0,3.0],[3.0,5.0]]]").unwrap();
        assert_eq!(flatten_features(tokens, 1).unwrap(), vec![vec![2.0, 4.0]]);

        let short: FeatureBody = serde_json::from_str("[[0.1,0.2]]").unwrap();
        assert!(flatten_features(short, 2).is_err());
    }

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(
            classification_url("https://example.test/", "org/model"),
            "https://example.test/models/org/model"
        );
        assert_eq!(
            feature_extraction_url("https://example.test", "org/model"),
            "https://example.test/pipeline/feature-extraction/org/model"
        );
    }

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let result: Result<(), NlpError> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(NlpError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_disabled_classifier_is_not_ready() {
        let mut endpoint = EndpointConfig::classifier();
        endpoint.enabled = false;
        let classifier = HttpSubjectivityClassifier::connect(&endpoint, None).await;
        assert!(!classifier.is_ready());
        assert!(matches!(
            classifier.classify("Anything.").await,
            Err(NlpError::Unavailable(_))
        ));
    }
}
