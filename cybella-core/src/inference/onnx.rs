//! ONNX backends via the `ort` crate.
//!
//! Targets two exports living side by side in one models directory:
//! - `embedding_model.onnx`: wav2vec2-style encoder, input `input_values [1, n]`
//!   (raw 16 kHz waveform) → `last_hidden_state [1, frames, hidden]`, mean-pooled
//!   over frames into one embedding
//! - `classifier_model.onnx`: dense head, input `[1, hidden]` (standardised)
//!   → `[1, n_labels]` probabilities
//! - `scaler.json`: standard-scaler mean/scale for the head's input
//! - `labels.json`: class names in the head's output order
//!
//! Sessions are created once at startup and then only read; `Session::run`
//! needs `&mut`, so each session sits behind a `parking_lot::Mutex`.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use ort::{
    ep,
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::Session,
    value::Value,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{
    softmax, EmbeddingExtractor, EmbeddingVector, FeatureScaler, LabelSet, ModelHandle,
    ProbabilityVector, SegmentClassifier,
};
use crate::error::{CybellaError, Result};

const EMBEDDING_FILE: &str = "embedding_model.onnx";
const CLASSIFIER_FILE: &str = "classifier_model.onnx";
const SCALER_FILE: &str = "scaler.json";
const LABELS_FILE: &str = "labels.json";

/// Variance floor used by the wav2vec2 feature extractor's normalisation.
const NORM_EPS: f32 = 1e-7;

// ── Model config ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OnnxModelConfig {
    pub embedding_path: PathBuf,
    pub classifier_path: PathBuf,
    pub scaler_path: PathBuf,
    pub labels_path: PathBuf,
    /// Apply a softmax to the head's output (for exports that end in logits).
    pub apply_softmax: bool,
}

impl OnnxModelConfig {
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            embedding_path: dir.join(EMBEDDING_FILE),
            classifier_path: dir.join(CLASSIFIER_FILE),
            scaler_path: dir.join(SCALER_FILE),
            labels_path: dir.join(LABELS_FILE),
            apply_softmax: false,
        }
    }
}

impl Default for OnnxModelConfig {
    fn default() -> Self {
        Self::from_dir(&selected_models_dir())
    }
}

fn selected_models_dir() -> PathBuf {
    if let Ok(explicit) = std::env::var("CYBELLA_MODEL_DIR") {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    default_models_dir()
}

pub fn default_models_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(|p| PathBuf::from(p).join("Cybella").join("models"))
            .unwrap_or_else(|| PathBuf::from("models"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("cybella")
            .join("models")
    }
}

fn create_session(model_path: &Path) -> Result<Session> {
    if !model_path.exists() {
        return Err(CybellaError::ModelNotFound {
            path: model_path.to_path_buf(),
        });
    }
    let logical_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let intra_threads = std::env::var("CYBELLA_ORT_INTRA_THREADS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(logical_cores.clamp(1, 8))
        .clamp(1, 32);

    let size_mb = std::fs::metadata(model_path)
        .map(|m| m.len() as f64 / 1_048_576.0)
        .unwrap_or(0.0);
    info!(path = ?model_path, size_mb = format_args!("{size_mb:.2}"), intra_threads, "loading ONNX session");

    SessionBuilder::new()
        .map_err(|e| CybellaError::OnnxSession(e.to_string()))?
        .with_intra_threads(intra_threads)
        .map_err(|e| CybellaError::OnnxSession(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::All)
        .map_err(|e| CybellaError::OnnxSession(e.to_string()))?
        .with_execution_providers([ep::CPU::default().build()])
        .map_err(|e| CybellaError::OnnxSession(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| CybellaError::OnnxSession(e.to_string()))
}

fn first_input_name(session: &Session, fallback: &str) -> String {
    session
        .inputs()
        .first()
        .map(|i| i.name().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

fn output_name(session: &Session, preferred: &str) -> Option<String> {
    let outputs = session.outputs();
    outputs
        .iter()
        .find(|o| o.name() == preferred)
        .or_else(|| outputs.first())
        .map(|o| o.name().to_string())
}

/// Zero-mean, unit-variance normalisation applied by wav2vec2 feature extractors.
fn normalize_waveform(samples: &[f32]) -> Vec<f32> {
    let n = samples.len().max(1) as f32;
    let mean = samples.iter().sum::<f32>() / n;
    let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f32>() / n;
    let denom = (var + NORM_EPS).sqrt();
    samples.iter().map(|s| (s - mean) / denom).collect()
}

// ── Embedding extractor ──────────────────────────────────────────────────────

pub struct OnnxEmbeddingExtractor {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxEmbeddingExtractor {
    pub fn load(path: &Path) -> Result<Self> {
        let session = create_session(path)?;
        let input_name = first_input_name(&session, "input_values");
        let output_name = output_name(&session, "last_hidden_state").ok_or_else(|| {
            CybellaError::OnnxSession(format!("{} has no outputs", path.display()))
        })?;
        info!(input = %input_name, output = %output_name, "embedding model ready");
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl EmbeddingExtractor for OnnxEmbeddingExtractor {
    fn warm_up(&self) -> Result<()> {
        let dummy = vec![0.0f32; 16_000];
        let emb = self.embed(&dummy, 16_000)?;
        info!(dim = emb.len(), "embedding model warm-up complete");
        Ok(())
    }

    fn embed(&self, window: &[f32], _sample_rate: u32) -> Result<EmbeddingVector> {
        if window.is_empty() {
            return Err(CybellaError::Embedding("empty window".into()));
        }
        let input = Array2::from_shape_vec((1, window.len()), normalize_waveform(window))
            .map_err(|e| CybellaError::Embedding(e.to_string()))?;
        let input_val = Value::from_array(input)
            .map_err(|e: ort::Error| CybellaError::OnnxSession(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_val])
            .map_err(|e| CybellaError::OnnxSession(e.to_string()))?;
        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| CybellaError::OnnxSession(e.to_string()))?;

        let pooled = mean_pool(&shape, data)?;
        debug!(samples = window.len(), dim = pooled.len(), "embedded window");
        Ok(EmbeddingVector::new(pooled))
    }
}

/// `[1, frames, hidden]` is averaged over frames; `[1, hidden]` is already pooled.
fn mean_pool(shape: &[i64], data: &[f32]) -> Result<Vec<f32>> {
    if shape.len() < 3 {
        return Ok(data.to_vec());
    }
    let frames = shape[1].max(1) as usize;
    let hidden = shape[2].max(0) as usize;
    if hidden == 0 {
        return Err(CybellaError::Embedding(format!(
            "hidden state has no features (shape {shape:?})"
        )));
    }
    let mut acc = vec![0.0f32; hidden];
    for frame in data.chunks_exact(hidden).take(frames) {
        for (a, v) in acc.iter_mut().zip(frame) {
            *a += v;
        }
    }
    Ok(acc.iter().map(|a| a / frames as f32).collect())
}

// ── Classifier ───────────────────────────────────────────────────────────────

pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    scaler: FeatureScaler,
    labels: LabelSet,
    apply_softmax: bool,
}

impl OnnxClassifier {
    pub fn load(config: &OnnxModelConfig) -> Result<Self> {
        let labels = LabelSet::from_json_file(&config.labels_path)?;
        let scaler = FeatureScaler::from_json_file(&config.scaler_path)?;
        let session = create_session(&config.classifier_path)?;
        let input_name = first_input_name(&session, "input");
        let output_name = output_name(&session, "output").ok_or_else(|| {
            CybellaError::OnnxSession(format!(
                "{} has no outputs",
                config.classifier_path.display()
            ))
        })?;
        info!(
            labels = labels.len(),
            scaler_dim = scaler.dim(),
            input = %input_name,
            output = %output_name,
            "classifier ready"
        );
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            scaler,
            labels,
            apply_softmax: config.apply_softmax,
        })
    }
}

impl SegmentClassifier for OnnxClassifier {
    fn warm_up(&self) -> Result<()> {
        let dummy = EmbeddingVector::new(self.scaler.mean.clone());
        self.classify(&dummy)?;
        info!("classifier warm-up complete");
        Ok(())
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn classify(&self, embedding: &EmbeddingVector) -> Result<ProbabilityVector> {
        let scaled = self.scaler.transform(embedding)?;
        let dim = scaled.len();
        let input = Array2::from_shape_vec((1, dim), scaled.0)
            .map_err(|e| CybellaError::Classifier(e.to_string()))?;
        let input_val = Value::from_array(input)
            .map_err(|e: ort::Error| CybellaError::OnnxSession(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_val])
            .map_err(|e| CybellaError::OnnxSession(e.to_string()))?;
        let (_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| CybellaError::OnnxSession(e.to_string()))?;

        if data.len() != self.labels.len() {
            warn!(
                outputs = data.len(),
                labels = self.labels.len(),
                "classifier output width does not match label set"
            );
            return Err(CybellaError::Classifier(format!(
                "classifier produced {} values for {} labels",
                data.len(),
                self.labels.len()
            )));
        }
        let probs = if self.apply_softmax {
            softmax(data)
        } else {
            data.to_vec()
        };
        Ok(ProbabilityVector::new(probs))
    }
}

/// Load both ONNX backends described by `config` into a [`ModelHandle`].
pub fn load_models(config: &OnnxModelConfig) -> Result<ModelHandle> {
    info!("=== Cybella ONNX model startup ===");
    let extractor = OnnxEmbeddingExtractor::load(&config.embedding_path)?;
    let classifier = OnnxClassifier::load(config)?;
    Ok(ModelHandle::new(extractor, classifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_normalisation_is_zero_mean_unit_variance() {
        let out = normalize_waveform(&[1.0, 2.0, 3.0, 4.0]);
        let mean = out.iter().sum::<f32>() / 4.0;
        let var = out.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn hidden_states_are_mean_pooled_over_frames() {
        let pooled = mean_pool(&[1, 2, 3], &[1.0, 2.0, 3.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(pooled, vec![2.0, 3.0, 4.0]);
        assert_eq!(mean_pool(&[1, 2], &[0.5, 0.25]).unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn zero_width_hidden_state_is_an_embedding_error() {
        let err = mean_pool(&[1, 49, 0], &[]).unwrap_err();
        assert!(matches!(err, CybellaError::Embedding(_)));
    }

    #[test]
    fn missing_model_file_is_reported() {
        let err = OnnxEmbeddingExtractor::load(Path::new("/no/such/model.onnx"))
            .err()
            .expect("load should fail");
        assert!(matches!(err, CybellaError::ModelNotFound { .. }));
    }

    #[test]
    fn config_from_dir_uses_fixed_file_names() {
        let cfg = OnnxModelConfig::from_dir(Path::new("/models"));
        assert_eq!(cfg.embedding_path, Path::new("/models/embedding_model.onnx"));
        assert_eq!(cfg.labels_path, Path::new("/models/labels.json"));
        assert!(!cfg.apply_softmax);
    }
}
