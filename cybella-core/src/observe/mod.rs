//! Structured diagnostic events emitted while a prediction runs.
//!
//! | Event | When |
//! |-------|------|
//! | `QualityEvent` | once per invocation, after the quality gate |
//! | `SegmentEvent` | once per classified window, in window order |
//!
//! Observers are called on the invoking thread after per-window results have
//! been re-ordered, so they always see windows in time order.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::quality::{QualityMetrics, QualityVerdict};

/// Default broadcast capacity for [`BroadcastObserver`].
const BROADCAST_CAP: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityEvent {
    pub verdict: QualityVerdict,
    pub metrics: QualityMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEvent {
    pub index: usize,
    /// Window time range in seconds; `end` is nominal for a short final window.
    pub start: f64,
    pub end: f64,
    /// Normalised label of the window's own arg-max.
    pub emotion: String,
    pub confidence: f64,
    /// Full distribution in native label order.
    pub probabilities: Vec<f32>,
}

/// Either kind of pipeline event, for single-channel consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineEvent {
    Quality(QualityEvent),
    Segment(SegmentEvent),
}

pub trait PipelineObserver: Send + Sync {
    fn on_quality(&self, _event: &QualityEvent) {}

    fn on_segment(&self, _event: &SegmentEvent) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Writes every event to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_quality(&self, event: &QualityEvent) {
        let m = &event.metrics;
        if event.verdict.is_usable() {
            info!(
                duration_secs = m.duration_secs,
                volume = m.mean_abs,
                peak = m.peak,
                energy_std = ?m.energy_std,
                "audio passed quality gate"
            );
        } else {
            warn!(
                verdict = %event.verdict,
                duration_secs = m.duration_secs,
                volume = m.mean_abs,
                peak = m.peak,
                energy_std = ?m.energy_std,
                "audio rejected by quality gate"
            );
        }
    }

    fn on_segment(&self, event: &SegmentEvent) {
        debug!(
            index = event.index,
            start = event.start,
            end = event.end,
            emotion = %event.emotion,
            confidence = event.confidence,
            "segment classified"
        );
    }
}

/// Fans events out over a Tokio broadcast channel.
///
/// Sends never block; with no live receivers the event is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<PipelineEvent>,
}

impl BroadcastObserver {
    pub fn new() -> Self {
        Self::with_capacity(BROADCAST_CAP)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for BroadcastObserver {
    fn on_quality(&self, event: &QualityEvent) {
        let _ = self.tx.send(PipelineEvent::Quality(event.clone()));
    }

    fn on_segment(&self, event: &SegmentEvent) {
        let _ = self.tx.send(PipelineEvent::Segment(event.clone()));
    }
}
