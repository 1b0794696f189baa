//! # cybella-core
//!
//! Voice-emotion prediction engine.
//!
//! ## Architecture
//!
//! ```text
//! AudioSignal (16 kHz mono f32)
//!      │
//!  validate ──► QualityGate ──► (too_short | too_soft | too_noisy) → rejection
//!      │
//!  SilenceTrimmer → WindowSegmenter (3 s windows)
//!      │
//!  per window: EmbeddingExtractor → SegmentClassifier   (optionally parallel)
//!      │
//!  EnsembleAggregator (average | best_segment) → ResultAssembler
//!      │
//!  PredictionResult { emotion, confidence, top3, segments }
//! ```
//!
//! Models are injected through [`ModelHandle`]; the `onnx` feature provides
//! wav2vec2 + dense-head backends, and [`inference::stub`] provides
//! deterministic ones for development.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod eval;
pub mod inference;
pub mod observe;
pub mod quality;
pub mod report;
pub mod segment;

// Convenience re-exports for downstream crates
pub use audio::AudioSignal;
pub use engine::{EmotionEngine, EngineConfig};
pub use ensemble::AggregationStrategy;
pub use error::{CybellaError, Result};
pub use inference::{
    EmbeddingExtractor, EmbeddingVector, LabelSet, ModelHandle, ProbabilityVector,
    SegmentClassifier,
};
pub use observe::{
    BroadcastObserver, NoopObserver, PipelineEvent, PipelineObserver, QualityEvent,
    SegmentEvent, TracingObserver,
};
pub use quality::{QualityGate, QualityThresholds, QualityVerdict};
pub use report::{PredictionResult, RankedEmotion, SegmentResult};

#[cfg(feature = "onnx")]
pub use inference::{OnnxClassifier, OnnxEmbeddingExtractor, OnnxModelConfig};
