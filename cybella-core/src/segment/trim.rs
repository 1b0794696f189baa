//! Trailing-silence trim and analysis length cap.
//!
//! ## Algorithm
//!
//! 1. Compute frame RMS. A frame is non-silent when its RMS is within
//!    `top_db` of the loudest frame. If the audio after the last non-silent
//!    frame is longer than `max_trailing_silence_secs`, cut it off.
//!    Leading silence is never touched, so window start times stay aligned
//!    with the original recording.
//! 2. If the result is longer than `long_clip_secs`, drop the final
//!    `tail_drop_secs`; otherwise keep at most `max_analysis_secs`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::{energy, AudioSignal};

/// Tunable constants for [`SilenceTrimmer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct TrimPolicy {
    /// Frames quieter than the loudest frame by more than this are silent. Default: 20.
    pub top_db: f32,
    /// Trailing silence is cut only when longer than this. Default: 1.0 s.
    pub max_trailing_silence_secs: f64,
    /// Clips longer than this lose their final `tail_drop_secs`. Default: 5.0 s.
    pub long_clip_secs: f64,
    /// Amount dropped from the end of long clips. Default: 1.0 s.
    pub tail_drop_secs: f64,
    /// Hard analysis ceiling for clips that are not long. Default: 9.0 s.
    pub max_analysis_secs: f64,
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self {
            top_db: 20.0,
            max_trailing_silence_secs: 1.0,
            long_clip_secs: 5.0,
            tail_drop_secs: 1.0,
            max_analysis_secs: 9.0,
            frame_length: energy::FRAME_LENGTH,
            hop_length: energy::HOP_LENGTH,
        }
    }
}

impl TrimPolicy {
    pub fn normalize(&mut self) {
        self.top_db = self.top_db.clamp(1.0, 120.0);
        self.max_trailing_silence_secs = self.max_trailing_silence_secs.max(0.0);
        self.long_clip_secs = self.long_clip_secs.max(0.0);
        self.tail_drop_secs = self.tail_drop_secs.clamp(0.0, self.long_clip_secs);
        self.max_analysis_secs = self.max_analysis_secs.max(0.0);
        self.frame_length = self.frame_length.clamp(16, 1 << 16);
        self.hop_length = self.hop_length.clamp(1, self.frame_length);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SilenceTrimmer {
    policy: TrimPolicy,
}

impl SilenceTrimmer {
    pub fn new(policy: TrimPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TrimPolicy {
        &self.policy
    }

    pub fn trim(&self, mut signal: AudioSignal) -> AudioSignal {
        let original_len = signal.len();

        if let Some(end) = self.last_voiced_sample(&signal.samples) {
            let tail = signal.len() - end;
            if tail > signal.samples_for(self.policy.max_trailing_silence_secs) {
                signal.samples.truncate(end);
            }
        }
        let after_silence = signal.len();

        let len = signal.len();
        if len > signal.samples_for(self.policy.long_clip_secs) {
            let drop = signal.samples_for(self.policy.tail_drop_secs);
            signal.samples.truncate(len.saturating_sub(drop));
        } else {
            let cap = signal.samples_for(self.policy.max_analysis_secs);
            signal.samples.truncate(cap);
        }

        debug!(
            original_len,
            after_silence,
            trimmed_len = signal.len(),
            "trimmed signal"
        );
        signal
    }

    /// Sample index one past the end of the last non-silent frame, or `None`
    /// when the whole signal is silent.
    fn last_voiced_sample(&self, samples: &[f32]) -> Option<usize> {
        let frames = energy::frame_rms(samples, self.policy.frame_length, self.policy.hop_length);
        let loudest = frames.iter().copied().fold(0.0f32, f32::max);
        if loudest <= 0.0 {
            return None;
        }
        let floor = loudest * 10f32.powf(-self.policy.top_db / 20.0);
        let last = frames.iter().rposition(|&rms| rms > floor)?;
        let end = last * self.policy.hop_length + self.policy.frame_length;
        Some(end.min(samples.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CANONICAL_SAMPLE_RATE;

    const SR: usize = CANONICAL_SAMPLE_RATE as usize;

    fn tone(amplitude: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / SR as f32).sin())
            .collect()
    }

    fn signal(parts: &[Vec<f32>]) -> AudioSignal {
        AudioSignal::new(parts.concat(), CANONICAL_SAMPLE_RATE)
    }

    #[test]
    fn long_trailing_silence_is_cut() {
        // 2 s speech + 2 s silence → silence cut near 2 s, then ≤5 s so the 9 s cap applies.
        let s = signal(&[tone(0.5, 2 * SR), vec![0.0; 2 * SR]]);
        let out = SilenceTrimmer::default().trim(s);
        assert!(out.len() >= 2 * SR && out.len() <= 2 * SR + energy::FRAME_LENGTH);
    }

    #[test]
    fn short_trailing_silence_is_kept() {
        // 0.5 s of trailing silence does not exceed the 1 s allowance.
        let s = signal(&[tone(0.5, 2 * SR), vec![0.0; SR / 2]]);
        let out = SilenceTrimmer::default().trim(s);
        assert_eq!(out.len(), 2 * SR + SR / 2);
    }

    #[test]
    fn leading_silence_is_never_trimmed() {
        let s = signal(&[vec![0.0; 2 * SR], tone(0.5, 2 * SR)]);
        let out = SilenceTrimmer::default().trim(s);
        assert_eq!(out.len(), 4 * SR);
        assert!(out.samples[..SR].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn long_clip_drops_final_second() {
        let s = signal(&[tone(0.5, 7 * SR)]);
        let out = SilenceTrimmer::default().trim(s);
        assert_eq!(out.len(), 6 * SR);
    }

    #[test]
    fn twelve_second_clip_is_not_capped_at_nine() {
        // Long clips only lose the tail; the 9 s ceiling belongs to the other branch.
        let s = signal(&[tone(0.5, 12 * SR)]);
        let out = SilenceTrimmer::default().trim(s);
        assert_eq!(out.len(), 11 * SR);
    }

    #[test]
    fn short_clip_is_capped_by_analysis_ceiling() {
        let trimmer = SilenceTrimmer::new(TrimPolicy {
            max_analysis_secs: 2.0,
            ..TrimPolicy::default()
        });
        let out = trimmer.trim(signal(&[tone(0.5, 4 * SR)]));
        assert_eq!(out.len(), 2 * SR);
    }

    #[test]
    fn all_silent_signal_is_left_alone() {
        let out = SilenceTrimmer::default().trim(signal(&[vec![0.0; 3 * SR]]));
        assert_eq!(out.len(), 3 * SR);
    }
}
