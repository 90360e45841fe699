// Configuration Storage Service
// Engine configuration, config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::detection::aggregation::Placement;
use super::detection::scoring::TierCutoffs;
use super::lexicon::{
    CERTAINTY_AND_ABSOLUTES, LOADED_LANGUAGE, PEACOCK_TERMS, VAGUE_AUTHORITY, WEASEL_WORDS,
};

pub const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_CLASSIFIER_MODEL: &str = "cffl/bert-base-styleclassification-subjective-neutral";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/paraphrase-MiniLM-L6-v2";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which detector the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    #[default]
    Hybrid,
    Lexicon,
    Statistical,
    Model,
    Embedding,
}

impl DetectorKind {
    pub fn parse(val: &str) -> Option<Self> {
        match val.trim().to_lowercase().as_str() {
            "hybrid" => Some(Self::Hybrid),
            "lexicon" => Some(Self::Lexicon),
            "statistical" | "nltk" => Some(Self::Statistical),
            "model" | "classifier" => Some(Self::Model),
            "embedding" | "semantic" => Some(Self::Embedding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorThresholds {
    #[serde(default = "default_statistical_threshold")]
    pub statistical: f64,
    #[serde(default = "default_model_threshold")]
    pub model: f64,
    #[serde(default = "default_embedding_threshold")]
    pub embedding: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            statistical: default_statistical_threshold(),
            model: default_model_threshold(),
            embedding: default_embedding_threshold(),
        }
    }
}

/// Severity tier cutoffs per detector family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSettings {
    #[serde(default = "TierCutoffs::subjectivity")]
    pub subjectivity: TierCutoffs,
    #[serde(default = "TierCutoffs::semantic")]
    pub semantic: TierCutoffs,
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            subjectivity: TierCutoffs::subjectivity(),
            semantic: TierCutoffs::semantic(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridConfig {
    #[serde(default = "default_true")]
    pub use_model: bool,
    #[serde(default = "default_strong_categories")]
    pub strong_categories: Vec<String>,
    #[serde(default = "default_hedging_categories")]
    pub hedging_categories: Vec<String>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            use_model: true,
            strong_categories: default_strong_categories(),
            hedging_categories: default_hedging_categories(),
        }
    }
}

/// Remote inference endpoint (Hugging Face Inference API request shapes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl EndpointConfig {
    pub fn classifier() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    pub fn embedder() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub detector: DetectorKind,
    #[serde(default)]
    pub thresholds: DetectorThresholds,
    #[serde(default)]
    pub tiers: TierSettings,
    #[serde(default)]
    pub hybrid: HybridConfig,
    #[serde(default = "default_lexicon_priority")]
    pub lexicon_priority: Vec<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default = "EndpointConfig::classifier")]
    pub classifier: EndpointConfig,
    #[serde(default = "EndpointConfig::embedder")]
    pub embedder: EndpointConfig,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            detector: DetectorKind::default(),
            thresholds: DetectorThresholds::default(),
            tiers: TierSettings::default(),
            hybrid: HybridConfig::default(),
            lexicon_priority: default_lexicon_priority(),
            concurrency: default_concurrency(),
            call_timeout_ms: default_call_timeout_ms(),
            placement: Placement::default(),
            classifier: EndpointConfig::classifier(),
            embedder: EndpointConfig::embedder(),
            api_keys: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("statistical", self.thresholds.statistical),
            ("model", self.thresholds.model),
            ("embedding", self.thresholds.embedding),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{} threshold is not finite", name)));
            }
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("callTimeoutMs must be positive".to_string()));
        }
        if self.lexicon_priority.is_empty() {
            return Err(ConfigError::Invalid("lexiconPriority is empty".to_string()));
        }
        Ok(())
    }

    /// Apply `SLANTSCOPE_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SLANTSCOPE_DETECTOR") {
            if let Some(kind) = DetectorKind::parse(&val) {
                self.detector = kind;
            }
        }
        if let Ok(val) = std::env::var("SLANTSCOPE_CONCURRENCY") {
            if let Ok(n) = val.trim().parse::<usize>() {
                self.concurrency = n.max(1);
            }
        }
        if let Ok(url) = std::env::var("SLANTSCOPE_CLASSIFIER_URL") {
            if !url.trim().is_empty() {
                self.classifier.base_url = url.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var("SLANTSCOPE_EMBEDDER_URL") {
            if !url.trim().is_empty() {
                self.embedder.base_url = url.trim().to_string();
            }
        }
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.call_timeout_ms)
    }
}

fn default_version() -> String { "1".to_string() }
fn default_true() -> bool { true }
fn default_statistical_threshold() -> f64 { 0.15 }
fn default_model_threshold() -> f64 { 0.4 }
fn default_embedding_threshold() -> f64 { 0.6 }
fn default_concurrency() -> usize { 4 }
fn default_call_timeout_ms() -> u64 { 30_000 }
fn default_request_timeout() -> u64 { 60 }
fn default_base_url() -> String { HF_INFERENCE_URL.to_string() }

fn default_lexicon_priority() -> Vec<String> {
    [LOADED_LANGUAGE, PEACOCK_TERMS, CERTAINTY_AND_ABSOLUTES, VAGUE_AUTHORITY, WEASEL_WORDS]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_strong_categories() -> Vec<String> {
    vec![LOADED_LANGUAGE.to_string(), PEACOCK_TERMS.to_string()]
}

fn default_hedging_categories() -> Vec<String> {
    vec![
        CERTAINTY_AND_ABSOLUTES.to_string(),
        VAGUE_AUTHORITY.to_string(),
        WEASEL_WORDS.to_string(),
    ]
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("slantscope"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir)?;
        Ok(())
    }

    /// Load configuration from file; a missing file yields defaults.
    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(EngineConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));
        fs::copy(&self.config_file, &backup_file)?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)
    }

    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first
        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, ConfigError> {
        let config = self.load()?;
        Ok(config.api_keys.get(provider).cloned())
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.detector, DetectorKind::Hybrid);
        assert_eq!(config.thresholds.statistical, 0.15);
        assert_eq!(config.thresholds.model, 0.4);
        assert_eq!(config.thresholds.embedding, 0.6);
        assert_eq!(config.lexicon_priority[0], LOADED_LANGUAGE);
        assert_eq!(config.placement, Placement::FirstOccurrence);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: EngineConfig =
            serde_json::from_str(r#"{"detector":"statistical","thresholds":{"statistical":0.2}}"#).unwrap();
        assert_eq!(parsed.detector, DetectorKind::Statistical);
        assert_eq!(parsed.thresholds.statistical, 0.2);
        assert_eq!(parsed.thresholds.model, 0.4);
        assert_eq!(parsed.concurrency, 4);
        assert_eq!(parsed.classifier.model, DEFAULT_CLASSIFIER_MODEL);
        assert_eq!(parsed.tiers.semantic.strong_avg, 0.6);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.thresholds.model = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_detector_kind_parse() {
        assert_eq!(DetectorKind::parse(" Embedding "), Some(DetectorKind::Embedding));
        assert_eq!(DetectorKind::parse("nltk"), Some(DetectorKind::Statistical));
        assert_eq!(DetectorKind::parse("unknown"), None);
    }

    #[test]
    fn test_store_round_trip_and_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());

        assert_eq!(store.load().unwrap().detector, DetectorKind::Hybrid);

        let mut config = EngineConfig::default();
        config.detector = DetectorKind::Lexicon;
        store.save(&config).unwrap();
        store.set_api_key("huggingface", "hf_test").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.detector, DetectorKind::Lexicon);
        assert_eq!(store.get_api_key("huggingface").unwrap().as_deref(), Some("hf_test"));
        assert!(dir.path().join("backups").exists());

        store.delete_api_key("huggingface").unwrap();
        assert_eq!(store.get_api_key("huggingface").unwrap(), None);
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        fs::write(store.config_file(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(ConfigError::Json(_))));
    }
}
