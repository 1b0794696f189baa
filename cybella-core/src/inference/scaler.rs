//! Standardisation applied to embeddings before classification.
//!
//! Mirrors a fitted standard scaler: `(x - mean) / scale` per dimension. The
//! parameters are exported alongside the classifier as JSON:
//!
//! ```json
//! { "mean": [0.01, ...], "scale": [0.92, ...] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::EmbeddingVector;
use crate::error::{CybellaError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl FeatureScaler {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self> {
        let scaler = Self { mean, scale };
        scaler.check()?;
        Ok(scaler)
    }

    /// Identity transform for `dim` dimensions.
    pub fn identity(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            scale: vec![1.0; dim],
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CybellaError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path)?;
        let scaler: Self = serde_json::from_str(&raw)?;
        scaler.check()?;
        Ok(scaler)
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, embedding: &EmbeddingVector) -> Result<EmbeddingVector> {
        if embedding.len() != self.dim() {
            return Err(CybellaError::Classifier(format!(
                "scaler expects {} dimensions, embedding has {}",
                self.dim(),
                embedding.len()
            )));
        }
        let values = embedding
            .as_slice()
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&m, &s))| (x - m) / s)
            .collect();
        Ok(EmbeddingVector::new(values))
    }

    fn check(&self) -> Result<()> {
        if self.mean.is_empty() || self.mean.len() != self.scale.len() {
            return Err(CybellaError::Config(format!(
                "scaler mean/scale lengths differ or are empty ({} vs {})",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self
            .scale
            .iter()
            .any(|s| !s.is_finite() || *s == 0.0)
            || self.mean.iter().any(|m| !m.is_finite())
        {
            return Err(CybellaError::Config(
                "scaler parameters must be finite with non-zero scale".into(),
            ));
        }
        Ok(())
    }
}
