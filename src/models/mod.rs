// Slantscope Data Models
// Article in, annotated segments and scores out

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::services::lexicon::TermMatch;

// ============ Input ============

/// A document submitted for analysis. Never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source_url: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

// ============ Segments ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    /// UTF-8 byte offset (0-based) into the analyzed text.
    pub start: usize,
    /// UTF-8 byte offset (0-based, end-exclusive) into the analyzed text.
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &TextSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One flagged span of the analyzed text.
///
/// `text` is always a verbatim substring of the content it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasSegment {
    pub text: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<TextSpan>,
}

impl BiasSegment {
    pub fn new(text: impl Into<String>, reason: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            text: text.into(),
            reason: reason.into(),
            score,
            category: None,
            span: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn highlight_level(&self) -> HighlightLevel {
        HighlightLevel::from_score(self.score.unwrap_or(0.0))
    }
}

/// Display band for a flagged segment, by score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightLevel {
    Low,
    Medium,
    High,
}

impl HighlightLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.4 {
            Self::High
        } else if score > 0.3 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn css_background(self) -> &'static str {
        match self {
            Self::High => "rgba(255, 76, 76, 0.4)",
            Self::Medium => "rgba(255, 165, 0, 0.4)",
            Self::Low => "rgba(255, 255, 0, 0.4)",
        }
    }
}

/// Outcome of running one detector over one sentence.
#[derive(Debug, Clone, Default)]
pub struct Assessment {
    pub finding: Option<BiasSegment>,
    /// An external capability failed or timed out for this sentence.
    pub degraded: bool,
}

impl Assessment {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn flagged(segment: BiasSegment) -> Self {
        Self {
            finding: Some(segment),
            degraded: false,
        }
    }

    pub fn degraded() -> Self {
        Self {
            finding: None,
            degraded: true,
        }
    }
}

// ============ Scoring ============

/// Ordinal severity bucket derived from segment count and average score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Neutral,
    Few,
    Moderate,
    Considerable,
    Strong,
}

impl SeverityTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Few => "few",
            Self::Moderate => "moderate",
            Self::Considerable => "considerable",
            Self::Strong => "strong",
        }
    }
}

// ============ Output ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub segments: Vec<BiasSegment>,
    pub overall_score: f64,
    pub article_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub request_id: String,
    pub result: AnalysisResult,
    pub summary: String,
    pub tier: SeverityTier,
    pub detector: String,
    pub word_count: usize,
    pub sentence_count: usize,
    pub degraded_sentences: usize,
    #[serde(default)]
    pub flagged_terms: Vec<TermMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_bands() {
        assert_eq!(HighlightLevel::from_score(0.75), HighlightLevel::High);
        assert_eq!(HighlightLevel::from_score(0.4), HighlightLevel::Medium);
        assert_eq!(HighlightLevel::from_score(0.35), HighlightLevel::Medium);
        assert_eq!(HighlightLevel::from_score(0.3), HighlightLevel::Low);
        let unscored = BiasSegment::new("x", "", None);
        assert_eq!(unscored.highlight_level(), HighlightLevel::Low);
    }

    #[test]
    fn test_highlight_colors() {
        let seg = BiasSegment::new("Great.", "", Some(0.75));
        assert_eq!(seg.highlight_level().css_background(), "rgba(255, 76, 76, 0.4)");
        assert_eq!(HighlightLevel::Medium.css_background(), "rgba(255, 165, 0, 0.4)");
        assert_eq!(HighlightLevel::Low.css_background(), "rgba(255, 255, 0, 0.4)");
    }

    #[test]
    fn test_span_overlap() {
        let a = TextSpan::new(0, 10);
        assert!(a.overlaps(&TextSpan::new(9, 12)));
        assert!(!a.overlaps(&TextSpan::new(10, 12)));
        assert!(TextSpan::new(4, 4).is_empty());
    }

    #[test]
    fn test_segment_serialization_skips_empty_optionals() {
        let seg = BiasSegment::new("Great.", "Use of 'Peacock Term': 'great'", Some(0.75));
        let json = serde_json::to_string(&seg).unwrap();
        assert!(!json.contains("span"));
        assert!(!json.contains("category"));
        let parsed: BiasSegment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, seg);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(SeverityTier::Strong > SeverityTier::Considerable);
        assert!(SeverityTier::Few > SeverityTier::Neutral);
        assert_eq!(SeverityTier::Moderate.as_str(), "moderate");
    }
}
