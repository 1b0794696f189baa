//! `EmotionEngine`: top-level prediction controller.
//!
//! ## Lifecycle
//!
//! ```text
//! EmotionEngine::new(config, models)
//!     └─► warm_up()                 → dummy forward pass through both models
//!         └─► predict(signal)       → PredictionResult (or a rejection)
//!         └─► predict_async(signal) → same, on Tokio's blocking pool
//! ```
//!
//! ## Threading
//!
//! The engine is `Clone + Send + Sync`: models sit behind `Arc`, diagnostics
//! are atomics, and each invocation owns its signal. Nothing computed by one
//! prediction feeds into another.

pub mod pipeline;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audio::{AudioSignal, CANONICAL_SAMPLE_RATE},
    ensemble::AggregationStrategy,
    error::{CybellaError, Result},
    inference::{LabelSet, ModelHandle},
    observe::{NoopObserver, PipelineObserver},
    quality::{QualityGate, QualityThresholds},
    report::PredictionResult,
    segment::{SilenceTrimmer, TrimPolicy, WindowPolicy, WindowSegmenter},
};

/// Upper bound on window workers per invocation.
const MAX_PARALLEL_WINDOWS: usize = 64;

/// Configuration for `EmotionEngine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sample rate every signal must arrive at (Hz). Default: 16000.
    pub sample_rate: u32,
    pub quality: QualityThresholds,
    pub trim: TrimPolicy,
    pub window: WindowPolicy,
    /// Default strategy; `predict_with_strategy` overrides it per call.
    pub strategy: AggregationStrategy,
    /// Window workers per invocation. 1 = sequential. Default: 1.
    pub max_parallel_windows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: CANONICAL_SAMPLE_RATE,
            quality: QualityThresholds::default(),
            trim: TrimPolicy::default(),
            window: WindowPolicy::default(),
            strategy: AggregationStrategy::default(),
            max_parallel_windows: 1,
        }
    }
}

impl EngineConfig {
    /// Clamp every field into its supported range.
    pub fn normalize(&mut self) {
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self.quality.normalize();
        self.trim.normalize();
        self.window.normalize();
        self.max_parallel_windows = self.max_parallel_windows.clamp(1, MAX_PARALLEL_WINDOWS);
    }
}

/// The top-level engine handle.
///
/// Cheap to clone; clones share models, observer and diagnostics.
#[derive(Clone)]
pub struct EmotionEngine {
    config: EngineConfig,
    gate: QualityGate,
    trimmer: SilenceTrimmer,
    segmenter: WindowSegmenter,
    model: ModelHandle,
    observer: Arc<dyn PipelineObserver>,
    /// Shared pipeline diagnostics counters.
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl EmotionEngine {
    /// Create a new engine. Models are used as given; call `warm_up()` before
    /// the first prediction to pay their start-up cost up front.
    pub fn new(mut config: EngineConfig, model: ModelHandle) -> Self {
        config.normalize();
        Self {
            gate: QualityGate::new(config.quality),
            trimmer: SilenceTrimmer::new(config.trim),
            segmenter: WindowSegmenter::new(config.window),
            config,
            model,
            observer: Arc::new(NoopObserver),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        }
    }

    /// Replace the observer that receives quality and per-window events.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run one dummy pass through each model.
    pub fn warm_up(&self) -> Result<()> {
        info!("warming up emotion models");
        self.model.extractor.warm_up()?;
        self.model.classifier.warm_up()?;
        info!(labels = self.model.labels().len(), "emotion models ready");
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelSet {
        self.model.labels()
    }

    /// Predict with the configured aggregation strategy.
    pub fn predict(&self, signal: AudioSignal) -> Result<PredictionResult> {
        self.predict_with_strategy(signal, self.config.strategy)
    }

    pub fn predict_with_strategy(
        &self,
        signal: AudioSignal,
        strategy: AggregationStrategy,
    ) -> Result<PredictionResult> {
        pipeline::run(&self.context(), signal, strategy)
    }

    /// [`predict`](Self::predict) on Tokio's blocking pool, keeping model
    /// inference off the async executor.
    pub async fn predict_async(&self, signal: AudioSignal) -> Result<PredictionResult> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.predict(signal))
            .await
            .map_err(|e| CybellaError::Other(anyhow::anyhow!("prediction task failed: {e}")))?
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn reset_diagnostics(&self) {
        self.diagnostics.reset();
    }

    fn context(&self) -> pipeline::PipelineContext<'_> {
        pipeline::PipelineContext {
            sample_rate: self.config.sample_rate,
            window_secs: self.config.window.window_secs,
            max_parallel_windows: self.config.max_parallel_windows,
            gate: &self.gate,
            trimmer: &self.trimmer,
            segmenter: &self.segmenter,
            model: &self.model,
            observer: self.observer.as_ref(),
            diagnostics: &self.diagnostics,
        }
    }
}

impl std::fmt::Debug for EmotionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionEngine")
            .field("config", &self.config)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_out_of_range_values() {
        let mut config = EngineConfig {
            sample_rate: 0,
            max_parallel_windows: 0,
            ..EngineConfig::default()
        };
        config.window.window_secs = -3.0;
        config.normalize();
        assert_eq!(config.sample_rate, 8_000);
        assert_eq!(config.max_parallel_windows, 1);
        assert!(config.window.window_secs > 0.0);
    }

    #[test]
    fn config_deserialises_from_partial_camel_case_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "strategy": "best_segment", "maxParallelWindows": 4, "quality": { "peakThreshold": 0.05 } }"#,
        )
        .unwrap();
        assert_eq!(config.strategy, AggregationStrategy::BestSegment);
        assert_eq!(config.max_parallel_windows, 4);
        assert_eq!(config.quality.peak_threshold, 0.05);
        assert_eq!(config.quality.volume_threshold, 0.0025);
        assert_eq!(config.sample_rate, 16_000);
    }
}
