// Scoring & Summarization
// Document-level bias points per 1000 words and ordinal severity tiers.
// Tier cutoffs influence the summary only, never the raw segment scores.

use serde::{Deserialize, Serialize};

use crate::models::{BiasSegment, SeverityTier};
use crate::services::text_processor::word_count;

/// Count and average-score cutoffs for the severity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCutoffs {
    pub strong_count: usize,
    pub strong_avg: f64,
    pub considerable_count: usize,
    pub considerable_avg: f64,
    pub moderate_count: usize,
}

impl TierCutoffs {
    /// Hybrid, lexicon, statistical and model detectors.
    pub fn subjectivity() -> Self {
        Self {
            strong_count: 10,
            strong_avg: 0.3,
            considerable_count: 5,
            considerable_avg: 0.2,
            moderate_count: 2,
        }
    }

    /// Embedding-similarity detector.
    pub fn semantic() -> Self {
        Self {
            strong_avg: 0.6,
            considerable_avg: 0.4,
            ..Self::subjectivity()
        }
    }
}

impl Default for TierCutoffs {
    fn default() -> Self {
        Self::subjectivity()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorFamily {
    Subjectivity,
    Semantic,
}

#[derive(Debug)]
struct SummaryWording {
    neutral: &'static str,
    few: &'static str,
    moderate: &'static str,
    considerable: &'static str,
    strong: &'static str,
}

const UNSCORED_SUMMARY: &str = "Biased passages were found, but without a reliable score.";

const SUBJECTIVITY_WORDING: SummaryWording = SummaryWording {
    neutral: "Based on the criteria, the article appears to be neutral.",
    few: "The article has few signs of subjective language.",
    moderate: "The article contains moderate traces of subjective bias.",
    considerable: "The article has a considerable presence of subjective language.",
    strong: "The article shows many passages with strong subjective language.",
};

const SEMANTIC_WORDING: SummaryWording = SummaryWording {
    neutral: "Based on semantic analysis, the article appears to be neutral.",
    few: "The article shows slight or isolated bias.",
    moderate: "The article has some traces of semantic bias.",
    considerable: "The article shows significant bias across several passages.",
    strong: "The article contains several semantically biased sentences with strong bias.",
};

/// How a detector turns its findings into a tier and a sentence of prose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryProfile {
    pub family: DetectorFamily,
    pub cutoffs: TierCutoffs,
}

impl SummaryProfile {
    pub fn subjectivity() -> Self {
        Self {
            family: DetectorFamily::Subjectivity,
            cutoffs: TierCutoffs::subjectivity(),
        }
    }

    pub fn semantic() -> Self {
        Self {
            family: DetectorFamily::Semantic,
            cutoffs: TierCutoffs::semantic(),
        }
    }

    pub fn with_cutoffs(mut self, cutoffs: TierCutoffs) -> Self {
        self.cutoffs = cutoffs;
        self
    }

    fn wording(&self) -> &'static SummaryWording {
        match self.family {
            DetectorFamily::Subjectivity => &SUBJECTIVITY_WORDING,
            DetectorFamily::Semantic => &SEMANTIC_WORDING,
        }
    }

    pub fn tier_text(&self, tier: SeverityTier) -> &'static str {
        let wording = self.wording();
        match tier {
            SeverityTier::Neutral => wording.neutral,
            SeverityTier::Few => wording.few,
            SeverityTier::Moderate => wording.moderate,
            SeverityTier::Considerable => wording.considerable,
            SeverityTier::Strong => wording.strong,
        }
    }
}

/// Bias points per 1000 words. Unset scores count as 0.
pub fn overall_score(segments: &[BiasSegment], content: &str) -> f64 {
    let words = word_count(content);
    if words == 0 {
        return 0.0;
    }
    let total: f64 = segments.iter().filter_map(|s| s.score).sum();
    total / words as f64 * 1000.0
}

/// Mean over segments that carry a score; `None` when none do.
pub fn average_score(segments: &[BiasSegment]) -> Option<f64> {
    let scores: Vec<f64> = segments.iter().filter_map(|s| s.score).collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

pub fn classify_tier(segments: &[BiasSegment], cutoffs: &TierCutoffs) -> SeverityTier {
    let total = segments.len();
    if total == 0 {
        return SeverityTier::Neutral;
    }
    let avg = average_score(segments).unwrap_or(0.0);

    if total >= cutoffs.strong_count && avg > cutoffs.strong_avg {
        SeverityTier::Strong
    } else if total >= cutoffs.considerable_count && avg > cutoffs.considerable_avg {
        SeverityTier::Considerable
    } else if total >= cutoffs.moderate_count {
        SeverityTier::Moderate
    } else {
        SeverityTier::Few
    }
}

pub fn summarize_segments(segments: &[BiasSegment], profile: &SummaryProfile) -> String {
    if !segments.is_empty() && average_score(segments).is_none() {
        return UNSCORED_SUMMARY.to_string();
    }
    let tier = classify_tier(segments, &profile.cutoffs);
    profile.tier_text(tier).to_string()
}
