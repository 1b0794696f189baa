//! One prediction, start to finish.
//!
//! ## Pipeline stages
//!
//! ```text
//! 1. Validate input (rate, non-empty, finite)
//! 2. Quality gate → Usable | TooShort | TooSoft | TooNoisy (terminal)
//! 3. Trim trailing silence, apply the length cap
//! 4. Segment into fixed windows (none → TooShort)
//! 5. Per window: embed → validate → classify → validate
//!    (sequential, or a scoped worker pool fed by a crossbeam queue)
//! 6. Re-order by window index, notify observer
//! 7. Aggregate → assemble PredictionResult
//! ```
//!
//! Runs synchronously on the caller's thread; `EmotionEngine::predict_async`
//! moves the whole call onto `spawn_blocking`.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::unbounded;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::{
    audio::AudioSignal,
    ensemble::{aggregate, AggregationStrategy},
    error::{CybellaError, Result},
    inference::{ModelHandle, ProbabilityVector},
    observe::{PipelineObserver, QualityEvent, SegmentEvent},
    quality::{QualityGate, QualityVerdict},
    report::{assemble, normalize_label, PredictionResult},
    segment::{SilenceTrimmer, Window, WindowSegmenter},
};

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub predictions: AtomicUsize,
    pub invalid_inputs: AtomicUsize,
    pub rejected_too_short: AtomicUsize,
    pub rejected_too_soft: AtomicUsize,
    pub rejected_too_noisy: AtomicUsize,
    pub windows_classified: AtomicUsize,
    pub model_errors: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.predictions.store(0, Ordering::Relaxed);
        self.invalid_inputs.store(0, Ordering::Relaxed);
        self.rejected_too_short.store(0, Ordering::Relaxed);
        self.rejected_too_soft.store(0, Ordering::Relaxed);
        self.rejected_too_noisy.store(0, Ordering::Relaxed);
        self.windows_classified.store(0, Ordering::Relaxed);
        self.model_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            predictions: self.predictions.load(Ordering::Relaxed),
            invalid_inputs: self.invalid_inputs.load(Ordering::Relaxed),
            rejected_too_short: self.rejected_too_short.load(Ordering::Relaxed),
            rejected_too_soft: self.rejected_too_soft.load(Ordering::Relaxed),
            rejected_too_noisy: self.rejected_too_noisy.load(Ordering::Relaxed),
            windows_classified: self.windows_classified.load(Ordering::Relaxed),
            model_errors: self.model_errors.load(Ordering::Relaxed),
        }
    }

    fn record_rejection(&self, verdict: QualityVerdict) {
        let counter = match verdict {
            QualityVerdict::TooShort => &self.rejected_too_short,
            QualityVerdict::TooSoft => &self.rejected_too_soft,
            QualityVerdict::TooNoisy => &self.rejected_too_noisy,
            QualityVerdict::Usable => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub predictions: usize,
    pub invalid_inputs: usize,
    pub rejected_too_short: usize,
    pub rejected_too_soft: usize,
    pub rejected_too_noisy: usize,
    pub windows_classified: usize,
    pub model_errors: usize,
}

/// Borrowed view of everything one invocation needs.
pub struct PipelineContext<'a> {
    pub sample_rate: u32,
    pub window_secs: f64,
    pub max_parallel_windows: usize,
    pub gate: &'a QualityGate,
    pub trimmer: &'a SilenceTrimmer,
    pub segmenter: &'a WindowSegmenter,
    pub model: &'a ModelHandle,
    pub observer: &'a dyn PipelineObserver,
    pub diagnostics: &'a PipelineDiagnostics,
}

pub fn run(
    ctx: &PipelineContext<'_>,
    signal: AudioSignal,
    strategy: AggregationStrategy,
) -> Result<PredictionResult> {
    let span = info_span!(
        "prediction",
        samples = signal.len(),
        sample_rate = signal.sample_rate,
        strategy = %strategy
    );
    let _enter = span.enter();
    ctx.diagnostics.predictions.fetch_add(1, Ordering::Relaxed);

    // ── 1. Input validation ──────────────────────────────────────────────
    if let Err(e) = signal.validate(ctx.sample_rate) {
        ctx.diagnostics.invalid_inputs.fetch_add(1, Ordering::Relaxed);
        warn!("rejecting malformed input: {e}");
        return Err(e);
    }

    // ── 2. Quality gate ──────────────────────────────────────────────────
    let (verdict, metrics) = ctx.gate.evaluate(&signal);
    ctx.observer.on_quality(&QualityEvent { verdict, metrics });
    if !verdict.is_usable() {
        ctx.diagnostics.record_rejection(verdict);
        debug!(%verdict, "quality gate short-circuit");
        return Ok(PredictionResult::rejected(verdict));
    }

    // ── 3–4. Trim + segment ──────────────────────────────────────────────
    let trimmed = ctx.trimmer.trim(signal);
    let windows = ctx.segmenter.segment(&trimmed);
    if windows.is_empty() {
        ctx.diagnostics.record_rejection(QualityVerdict::TooShort);
        warn!(
            trimmed_secs = trimmed.duration_secs(),
            "no analysis window survived trimming"
        );
        return Ok(PredictionResult::rejected(QualityVerdict::TooShort));
    }
    debug!(
        windows = windows.len(),
        trimmed_secs = trimmed.duration_secs(),
        "segmented signal"
    );

    // ── 5–6. Classify windows ────────────────────────────────────────────
    let vectors = match classify_windows(ctx, &trimmed, &windows) {
        Ok(v) => v,
        Err(e) => {
            ctx.diagnostics.model_errors.fetch_add(1, Ordering::Relaxed);
            error!("window classification failed: {e}");
            return Err(e);
        }
    };
    ctx.diagnostics
        .windows_classified
        .fetch_add(vectors.len(), Ordering::Relaxed);
    notify_segments(ctx, &vectors);

    // ── 7. Aggregate + assemble ──────────────────────────────────────────
    let agg = aggregate(&vectors, strategy)?;
    let result = assemble(ctx.model.labels(), &vectors, &agg, ctx.window_secs);
    info!(
        emotion = %result.emotion,
        confidence = result.confidence,
        windows = vectors.len(),
        "prediction complete"
    );
    Ok(result)
}

fn notify_segments(ctx: &PipelineContext<'_>, vectors: &[ProbabilityVector]) {
    let labels = ctx.model.labels();
    for (index, v) in vectors.iter().enumerate() {
        let Some((label_index, p)) = v.argmax() else {
            continue;
        };
        let start = index as f64 * ctx.window_secs;
        ctx.observer.on_segment(&SegmentEvent {
            index,
            start,
            end: start + ctx.window_secs,
            emotion: labels.get(label_index).map(normalize_label).unwrap_or_default(),
            confidence: f64::from(p),
            probabilities: v.as_slice().to_vec(),
        });
    }
}

/// Classify every window, returning distributions in window order.
fn classify_windows(
    ctx: &PipelineContext<'_>,
    signal: &AudioSignal,
    windows: &[Window],
) -> Result<Vec<ProbabilityVector>> {
    let workers = ctx.max_parallel_windows.min(windows.len());
    if workers <= 1 {
        return windows
            .iter()
            .map(|w| classify_window(ctx.model, signal, w))
            .collect();
    }
    classify_parallel(ctx.model, signal, windows, workers)
}

fn classify_window(
    model: &ModelHandle,
    signal: &AudioSignal,
    window: &Window,
) -> Result<ProbabilityVector> {
    let embedding = model
        .extractor
        .embed(window.samples(signal), signal.sample_rate)?;
    embedding.validate(window.index)?;

    let probs = model.classifier.classify(&embedding)?;
    probs.validate(window.index, model.labels().len())?;

    debug!(
        window = window.index,
        samples = window.len(),
        dim = embedding.len(),
        "window classified"
    );
    Ok(probs)
}

/// Scoped worker pool: workers pull windows from a shared queue and push
/// `(index, outcome)` back. Every window runs to completion; the error of the
/// lowest failing index wins.
fn classify_parallel(
    model: &ModelHandle,
    signal: &AudioSignal,
    windows: &[Window],
    workers: usize,
) -> Result<Vec<ProbabilityVector>> {
    let (job_tx, job_rx) = unbounded::<Window>();
    for window in windows {
        job_tx
            .send(*window)
            .map_err(|e| CybellaError::Other(anyhow::anyhow!("window queue closed: {e}")))?;
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded::<(usize, Result<ProbabilityVector>)>();
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for window in job_rx.iter() {
                    let outcome = classify_window(model, signal, &window);
                    if result_tx.send((window.index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<Result<ProbabilityVector>>> =
        std::iter::repeat_with(|| None).take(windows.len()).collect();
    for (index, outcome) in result_rx.iter() {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(outcome);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                Err(CybellaError::Other(anyhow::anyhow!(
                    "window {index} produced no result"
                )))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_counted_per_verdict() {
        let diagnostics = PipelineDiagnostics::default();
        diagnostics.record_rejection(QualityVerdict::TooSoft);
        diagnostics.record_rejection(QualityVerdict::TooSoft);
        diagnostics.record_rejection(QualityVerdict::TooNoisy);
        diagnostics.record_rejection(QualityVerdict::Usable);
        let snap = diagnostics.snapshot();
        assert_eq!(snap.rejected_too_soft, 2);
        assert_eq!(snap.rejected_too_noisy, 1);
        assert_eq!(snap.rejected_too_short, 0);

        diagnostics.reset();
        assert_eq!(diagnostics.snapshot().rejected_too_soft, 0);
    }
}
