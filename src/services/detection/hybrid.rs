// Hybrid Composition Strategy
// Ordered detector stages with early exit: the first stage that flags a sentence wins

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::Assessment;
use crate::services::config_store::HybridConfig;
use crate::services::lexicon::{LexiconError, LexiconStore};

use super::detector::BiasDetector;
use super::lexicon_detector::LexiconDetector;
use super::model_based::DEFAULT_MODEL_THRESHOLD;
use super::scoring::SummaryProfile;

pub struct HybridDetector {
    stages: Vec<Arc<dyn BiasDetector>>,
    threshold: f64,
    profile: SummaryProfile,
}

impl HybridDetector {
    /// Custom stage list, tried in order.
    pub fn new(stages: Vec<Arc<dyn BiasDetector>>) -> Self {
        Self {
            stages,
            threshold: DEFAULT_MODEL_THRESHOLD,
            profile: SummaryProfile::subjectivity(),
        }
    }

    /// Model classifier, then strongly loaded terms, then hedging and vague terms.
    pub fn standard(
        store: Arc<LexiconStore>,
        model: Option<Arc<dyn BiasDetector>>,
        config: &HybridConfig,
    ) -> Result<Self, LexiconError> {
        let mut stages: Vec<Arc<dyn BiasDetector>> = Vec::with_capacity(3);
        let mut threshold = DEFAULT_MODEL_THRESHOLD;

        if let Some(model) = model.filter(|_| config.use_model) {
            threshold = model.threshold();
            stages.push(model);
        }
        if !config.strong_categories.is_empty() {
            stages.push(Arc::new(
                LexiconDetector::for_categories(store.clone(), &config.strong_categories)?
                    .named("lexicon:strong"),
            ));
        }
        if !config.hedging_categories.is_empty() {
            stages.push(Arc::new(
                LexiconDetector::for_categories(store, &config.hedging_categories)?
                    .named("lexicon:hedging"),
            ));
        }

        Ok(Self {
            stages,
            threshold,
            profile: SummaryProfile::subjectivity(),
        })
    }

    pub fn with_summary_profile(mut self, profile: SummaryProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl BiasDetector for HybridDetector {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn is_ready(&self) -> bool {
        self.stages.iter().any(|s| s.is_ready())
    }

    fn summary_profile(&self) -> SummaryProfile {
        self.profile
    }

    async fn assess(&self, sentence: &str) -> Assessment {
        let mut degraded = false;
        for stage in self.stages.iter().filter(|s| s.is_ready()) {
            let assessment = stage.assess(sentence).await;
            degraded |= assessment.degraded;
            if let Some(finding) = assessment.finding {
                return Assessment {
                    finding: Some(finding),
                    degraded,
                };
            }
        }
        Assessment {
            finding: None,
            degraded,
        }
    }
}
