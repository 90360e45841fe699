// Statistical Subjectivity Detector
// Opinion-word density over stop-word-free, stemmed tokens

use async_trait::async_trait;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::models::{Assessment, BiasSegment};
use crate::services::text_processor::{is_alphabetic_token, is_stopword, parse_word_list, word_tokens};

use super::detector::BiasDetector;
use super::scoring::SummaryProfile;

pub const DEFAULT_STATISTICAL_THRESHOLD: f64 = 0.15;

/// Positive and negative opinion words, stored in stemmed form.
#[derive(Debug, Clone)]
pub struct OpinionLexicon {
    positive: HashSet<String>,
    negative: HashSet<String>,
}

/// Hu & Liu opinion lexicon (KDD 2004), one word per line.
const POSITIVE_WORDS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/opinion_positive.txt"));
const NEGATIVE_WORDS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/opinion_negative.txt"));

static SHARED: OnceLock<Arc<OpinionLexicon>> = OnceLock::new();

impl OpinionLexicon {
    pub fn from_lists(positive: &str, negative: &str) -> Self {
        let stemmer = Stemmer::create(Algorithm::English);
        let stem_all = |raw: &str| -> HashSet<String> {
            parse_word_list(raw)
                .iter()
                .map(|w| stemmer.stem(w).into_owned())
                .collect()
        };
        Self {
            positive: stem_all(positive),
            negative: stem_all(negative),
        }
    }

    pub fn shared() -> Arc<OpinionLexicon> {
        SHARED
            .get_or_init(|| Arc::new(Self::from_lists(POSITIVE_WORDS, NEGATIVE_WORDS)))
            .clone()
    }

    pub fn is_positive(&self, stem: &str) -> bool {
        self.positive.contains(stem)
    }

    pub fn is_negative(&self, stem: &str) -> bool {
        self.negative.contains(stem)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpinionDensity {
    pub positive: usize,
    pub negative: usize,
    pub clean_tokens: usize,
    pub score: f64,
}

pub struct StatisticalDetector {
    lexicon: Arc<OpinionLexicon>,
    stemmer: Stemmer,
    threshold: f64,
    profile: SummaryProfile,
}

impl Default for StatisticalDetector {
    fn default() -> Self {
        Self::new(DEFAULT_STATISTICAL_THRESHOLD)
    }
}

impl StatisticalDetector {
    pub fn new(threshold: f64) -> Self {
        Self::with_lexicon(OpinionLexicon::shared(), threshold)
    }

    pub fn with_lexicon(lexicon: Arc<OpinionLexicon>, threshold: f64) -> Self {
        Self {
            lexicon,
            stemmer: Stemmer::create(Algorithm::English),
            threshold,
            profile: SummaryProfile::subjectivity(),
        }
    }

    pub fn with_summary_profile(mut self, profile: SummaryProfile) -> Self {
        self.profile = profile;
        self
    }

    /// `(pos + neg) / (clean + 1)` where clean tokens are alphabetic non-stopwords.
    pub fn density(&self, sentence: &str) -> OpinionDensity {
        let mut positive = 0;
        let mut negative = 0;
        let mut clean_tokens = 0;

        for token in word_tokens(sentence) {
            if !is_alphabetic_token(&token) || is_stopword(&token) {
                continue;
            }
            clean_tokens += 1;
            let stem = self.stemmer.stem(&token);
            if self.lexicon.is_positive(&stem) {
                positive += 1;
            }
            if self.lexicon.is_negative(&stem) {
                negative += 1;
            }
        }

        OpinionDensity {
            positive,
            negative,
            clean_tokens,
            score: (positive + negative) as f64 / (clean_tokens + 1) as f64,
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[async_trait]
impl BiasDetector for StatisticalDetector {
    fn name(&self) -> &str {
        "statistical"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn summary_profile(&self) -> SummaryProfile {
        self.profile
    }

    async fn assess(&self, sentence: &str) -> Assessment {
        let density = self.density(sentence);
        if density.score <= self.threshold {
            return Assessment::clear();
        }
        let score = round_to(density.score, 3);
        Assessment::flagged(BiasSegment::new(
            sentence,
            format!(
                "Opinion-word density {:.3} ({} positive, {} negative)",
                score, density.positive, density.negative
            ),
            Some(score),
        ))
    }
}
