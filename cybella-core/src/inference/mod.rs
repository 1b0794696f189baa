//! Embedding and classifier abstractions.
//!
//! The pipeline never knows which backend produced an embedding or a
//! distribution. `EmbeddingExtractor` turns one window of samples into a
//! fixed-length vector; `SegmentClassifier` turns that vector into a
//! probability distribution over its native label order.
//!
//! Both traits take `&self`: models are loaded once, are read-only afterwards,
//! and may be called from several window workers at once. Backends whose
//! runtime needs `&mut` (ONNX sessions) serialise internally through
//! `parking_lot::Mutex`.

pub mod scaler;
pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxClassifier, OnnxEmbeddingExtractor, OnnxModelConfig};

pub use scaler::FeatureScaler;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CybellaError, Result};

/// Tolerance on `sum(p) == 1` for a classifier distribution.
pub const DISTRIBUTION_SUM_TOLERANCE: f64 = 1e-3;

/// The classifier's class names in native (output-index) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(CybellaError::Config("label set must not be empty".into()));
        }
        if labels.iter().any(|l| l.trim().is_empty()) {
            return Err(CybellaError::Config("label set contains a blank label".into()));
        }
        Ok(Self(labels))
    }

    /// Load a JSON array of class names (e.g. an exported label encoder).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CybellaError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = CybellaError;

    fn try_from(value: Vec<String>) -> Result<Self> {
        LabelSet::new(value)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(value: LabelSet) -> Self {
        value.0
    }
}

/// Fixed-length numeric summary of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(pub Vec<f32>);

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail fast on empty or non-finite embeddings.
    pub fn validate(&self, window: usize) -> Result<()> {
        if self.0.is_empty() {
            return Err(CybellaError::InvalidEmbedding {
                window,
                reason: "embedding is empty".into(),
            });
        }
        if let Some(i) = self.0.iter().position(|v| !v.is_finite()) {
            return Err(CybellaError::InvalidEmbedding {
                window,
                reason: format!("non-finite value at dimension {i}"),
            });
        }
        Ok(())
    }
}

/// One probability per label, aligned with the classifier's [`LabelSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector(pub Vec<f32>);

impl ProbabilityVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index and value of the most probable label; the first index wins ties.
    pub fn argmax(&self) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &p) in self.0.iter().enumerate() {
            match best {
                Some((_, b)) if p <= b => {}
                _ => best = Some((i, p)),
            }
        }
        best
    }

    /// Check length, finiteness, range and normalisation.
    pub fn validate(&self, window: usize, n_labels: usize) -> Result<()> {
        let invalid = |reason: String| CybellaError::InvalidDistribution { window, reason };

        if self.0.len() != n_labels {
            return Err(invalid(format!(
                "expected {n_labels} probabilities, got {}",
                self.0.len()
            )));
        }
        if let Some(i) = self.0.iter().position(|p| !p.is_finite()) {
            return Err(invalid(format!("non-finite probability at index {i}")));
        }
        if let Some(i) = self.0.iter().position(|&p| !(0.0..=1.0).contains(&p)) {
            return Err(invalid(format!(
                "probability {} at index {i} is outside [0, 1]",
                self.0[i]
            )));
        }
        let sum: f64 = self.0.iter().map(|&p| f64::from(p)).sum();
        if (sum - 1.0).abs() > DISTRIBUTION_SUM_TOLERANCE {
            return Err(invalid(format!("probabilities sum to {sum:.6}")));
        }
        Ok(())
    }
}

/// Contract for embedding backends.
pub trait EmbeddingExtractor: Send + Sync + 'static {
    /// One-time warm-up (dummy forward pass). Called once at engine startup.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Embed one window of mono samples at `sample_rate`.
    fn embed(&self, window: &[f32], sample_rate: u32) -> Result<EmbeddingVector>;
}

/// Contract for classifier backends (scaler included).
pub trait SegmentClassifier: Send + Sync + 'static {
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Native label order of every distribution this classifier returns.
    fn labels(&self) -> &LabelSet;

    fn classify(&self, embedding: &EmbeddingVector) -> Result<ProbabilityVector>;
}

/// Thread-safe reference-counted handle to the loaded model pair.
#[derive(Clone)]
pub struct ModelHandle {
    pub extractor: Arc<dyn EmbeddingExtractor>,
    pub classifier: Arc<dyn SegmentClassifier>,
}

impl ModelHandle {
    pub fn new<E, C>(extractor: E, classifier: C) -> Self
    where
        E: EmbeddingExtractor,
        C: SegmentClassifier,
    {
        Self {
            extractor: Arc::new(extractor),
            classifier: Arc::new(classifier),
        }
    }

    pub fn labels(&self) -> &LabelSet {
        self.classifier.labels()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("labels", self.classifier.labels())
            .finish_non_exhaustive()
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_set_rejects_empty_and_blank() {
        assert!(LabelSet::new(Vec::<String>::new()).is_err());
        assert!(LabelSet::new(["happy", " "]).is_err());
        let labels = LabelSet::new(["angry", "calm"]).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(1), Some("calm"));
        assert_eq!(labels.get(2), None);
    }

    #[test]
    fn label_set_deserializes_from_json_array() {
        let labels: LabelSet = serde_json::from_str(r#"["angry","Fear","sad"]"#).unwrap();
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["angry", "Fear", "sad"]);
        assert!(serde_json::from_str::<LabelSet>("[]").is_err());
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        let p = ProbabilityVector::new(vec![0.4, 0.4, 0.2]);
        assert_eq!(p.argmax(), Some((0, 0.4)));
        assert_eq!(ProbabilityVector::new(vec![]).argmax(), None);
    }

    #[test]
    fn distribution_validation() {
        let ok = ProbabilityVector::new(vec![0.2, 0.3, 0.5]);
        assert!(ok.validate(0, 3).is_ok());

        let wrong_len = ProbabilityVector::new(vec![0.5, 0.5]);
        assert!(matches!(
            wrong_len.validate(4, 3),
            Err(CybellaError::InvalidDistribution { window: 4, .. })
        ));

        let nan = ProbabilityVector::new(vec![f32::NAN, 0.5, 0.5]);
        assert!(nan.validate(0, 3).is_err());

        let unnormalised = ProbabilityVector::new(vec![0.2, 0.2, 0.2]);
        assert!(unnormalised.validate(0, 3).is_err());

        let negative = ProbabilityVector::new(vec![-0.1, 0.6, 0.5]);
        assert!(negative.validate(0, 3).is_err());
    }

    #[test]
    fn embedding_validation() {
        assert!(EmbeddingVector::new(vec![0.1, 2.0]).validate(0).is_ok());
        assert!(EmbeddingVector::new(vec![]).validate(0).is_err());
        assert!(matches!(
            EmbeddingVector::new(vec![0.1, f32::INFINITY]).validate(2),
            Err(CybellaError::InvalidEmbedding { window: 2, .. })
        ));
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }
}
