// Slantscope Core Services

pub mod text_processor;
pub mod sentence_segmenter;
pub mod lexicon;
pub mod config_store;
pub mod providers;
pub mod detection;

pub use text_processor::*;
pub use sentence_segmenter::*;
pub use lexicon::*;
pub use config_store::*;
pub use providers::*;

// Re-export detection module items
pub use detection::{
    aggregate_segments,
    build_detector,
    overall_score,
    summarize_segments,
    BiasDetector,
    BiasEngine,
    EmbeddingDetector,
    EngineError,
    HybridDetector,
    LexiconDetector,
    ModelDetector,
    Placement,
    ReferenceSet,
    StatisticalDetector,
    SummaryProfile,
    TierCutoffs,
};
