//! Stub backends: deterministic placeholders that need no model files.
//!
//! Used during development and by `cybella --stub` so the full gate →
//! window → aggregate → result path can be exercised without ONNX exports.
//! The embedding is a handful of prosodic statistics and the classifier is a
//! fixed linear map over them, so the output is reproducible but carries no
//! real emotional meaning.

use tracing::debug;

use super::{
    softmax, EmbeddingExtractor, EmbeddingVector, LabelSet, ProbabilityVector, SegmentClassifier,
};
use crate::audio::energy;
use crate::error::{CybellaError, Result};

/// Class order of the label encoder the production classifier was fitted with.
pub const DEFAULT_LABELS: [&str; 8] = [
    "angry", "calm", "disgust", "fear", "happy", "neutral", "sad", "surprised",
];

/// Embedding dimension produced by [`StubExtractor`].
pub const STUB_EMBEDDING_DIM: usize = 4;

/// Embeds a window as `[rms, mean_abs, peak, zero_crossing_rate]`.
#[derive(Debug, Clone, Default)]
pub struct StubExtractor;

impl StubExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddingExtractor for StubExtractor {
    fn warm_up(&self) -> Result<()> {
        debug!("StubExtractor::warm_up (no-op)");
        Ok(())
    }

    fn embed(&self, window: &[f32], _sample_rate: u32) -> Result<EmbeddingVector> {
        if window.is_empty() {
            return Err(CybellaError::Embedding("empty window".into()));
        }
        let crossings = window
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count();
        let zcr = crossings as f32 / window.len() as f32;
        Ok(EmbeddingVector::new(vec![
            energy::rms(window),
            energy::mean_abs(window),
            energy::peak(window),
            zcr,
        ]))
    }
}

/// Linear scores over the stub embedding followed by a softmax.
#[derive(Debug, Clone)]
pub struct StubClassifier {
    labels: LabelSet,
    /// One row of `STUB_EMBEDDING_DIM` weights plus a bias per label.
    weights: Vec<[f32; STUB_EMBEDDING_DIM + 1]>,
}

impl StubClassifier {
    pub fn new() -> Self {
        // Columns: rms, mean_abs, peak, zcr, bias.
        let weights = vec![
            [9.0, 4.0, 2.0, 1.0, -2.0],   // angry
            [-8.0, -4.0, -1.0, -2.0, 1.5], // calm
            [2.0, 1.0, 0.5, -1.0, -0.5],  // disgust
            [1.0, 0.5, 1.5, 6.0, -1.5],   // fear
            [6.0, 3.0, 1.0, 2.0, -1.0],   // happy
            [-4.0, -2.0, 0.0, 0.0, 1.0],  // neutral
            [-6.0, -3.0, -1.0, -3.0, 1.0], // sad
            [4.0, 1.0, 4.0, 3.0, -2.0],   // surprised
        ];
        let labels = LabelSet(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect());
        Self { labels, weights }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentClassifier for StubClassifier {
    fn warm_up(&self) -> Result<()> {
        debug!("StubClassifier::warm_up (no-op)");
        Ok(())
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn classify(&self, embedding: &EmbeddingVector) -> Result<ProbabilityVector> {
        let x = embedding.as_slice();
        if x.len() != STUB_EMBEDDING_DIM {
            return Err(CybellaError::Classifier(format!(
                "stub classifier expects {STUB_EMBEDDING_DIM} dimensions, got {}",
                x.len()
            )));
        }
        let logits: Vec<f32> = self
            .weights
            .iter()
            .map(|row| {
                row[..STUB_EMBEDDING_DIM]
                    .iter()
                    .zip(x)
                    .map(|(w, v)| w * v)
                    .sum::<f32>()
                    + row[STUB_EMBEDDING_DIM]
            })
            .collect();
        Ok(ProbabilityVector::new(softmax(&logits)))
    }
}
