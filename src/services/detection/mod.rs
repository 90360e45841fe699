// Detection Module
// Bias detection core organized into specialized submodules:
// - detector: BiasDetector capability shared by every variant
// - lexicon_detector / statistical / model_based / embedding: detector variants
// - hybrid: ordered stage composition with early exit
// - aggregation: places findings on the content as non-overlapping spans
// - scoring: overall score, severity tiers and summaries
// - pipeline: BiasEngine, bounded concurrent per-sentence analysis

pub mod detector;
pub mod lexicon_detector;
pub mod statistical;
pub mod model_based;
pub mod embedding;
pub mod hybrid;
pub mod aggregation;
pub mod scoring;
pub mod pipeline;

// Re-export commonly used items
pub use detector::BiasDetector;
pub use lexicon_detector::LexiconDetector;
pub use statistical::{OpinionDensity, OpinionLexicon, StatisticalDetector};
pub use model_based::ModelDetector;
pub use embedding::{EmbeddingDetector, ReferenceSet};
pub use hybrid::HybridDetector;
pub use aggregation::{aggregate_segments, sanitize_score, Placement};
pub use scoring::{
    average_score,
    classify_tier,
    overall_score,
    summarize_segments,
    DetectorFamily,
    SummaryProfile,
    TierCutoffs,
};
pub use pipeline::{build_detector, BiasEngine, EngineError};
