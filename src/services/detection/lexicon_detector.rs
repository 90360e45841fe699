// Lexicon Detector
// Flags a sentence on the first category (in priority order) with a matching term

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{Assessment, BiasSegment};
use crate::services::lexicon::{LexiconError, LexiconStore};
use crate::services::text_processor::word_tokens;

use super::detector::BiasDetector;
use super::scoring::SummaryProfile;

pub struct LexiconDetector {
    name: String,
    store: Arc<LexiconStore>,
    // Catalog indices, highest priority first.
    order: Vec<usize>,
    profile: SummaryProfile,
}

impl LexiconDetector {
    /// All categories in catalog order.
    pub fn new(store: Arc<LexiconStore>) -> Self {
        let order = (0..store.categories().len()).collect();
        Self {
            name: "lexicon".to_string(),
            store,
            order,
            profile: SummaryProfile::subjectivity(),
        }
    }

    /// Restrict to the named categories, checked in the given order.
    pub fn for_categories<S: AsRef<str>>(
        store: Arc<LexiconStore>,
        names: &[S],
    ) -> Result<Self, LexiconError> {
        let order = store.resolve(names)?;
        Ok(Self {
            name: "lexicon".to_string(),
            store,
            order,
            profile: SummaryProfile::subjectivity(),
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_summary_profile(mut self, profile: SummaryProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&idx| self.store.categories()[idx].name.as_str())
            .collect()
    }

    fn first_hit(&self, sentence: &str) -> Option<BiasSegment> {
        let tokens = word_tokens(sentence);
        if tokens.is_empty() {
            return None;
        }
        self.order.iter().find_map(|&idx| {
            let category = &self.store.categories()[idx];
            category.first_match(&tokens).map(|term| {
                BiasSegment::new(
                    sentence,
                    format!("Use of '{}' term: '{}'", category.name, term),
                    Some(category.score()),
                )
                .with_category(category.name.clone())
            })
        })
    }
}

#[async_trait]
impl BiasDetector for LexiconDetector {
    fn name(&self) -> &str {
        &self.name
    }

    /// Any lexicon hit fires; the category score is fixed.
    fn threshold(&self) -> f64 {
        0.0
    }

    fn summary_profile(&self) -> SummaryProfile {
        self.profile
    }

    async fn assess(&self, sentence: &str) -> Assessment {
        match self.first_hit(sentence) {
            Some(segment) => Assessment::flagged(segment),
            None => Assessment::clear(),
        }
    }
}
