//! Input-quality gate.
//!
//! Rejects recordings that cannot carry a usable emotional signal before any
//! model is invoked. Checks run in a fixed order and the first failing check
//! decides the verdict:
//!
//! 1. duration below `min_duration_secs` → [`QualityVerdict::TooShort`]
//! 2. mean |x| below `volume_threshold` → [`QualityVerdict::TooSoft`]
//! 3. peak |x| below `peak_threshold` → [`QualityVerdict::TooNoisy`]
//! 4. std-dev of frame RMS below `energy_std_threshold` → [`QualityVerdict::TooNoisy`]
//!
//! The last check catches constant loud noise, which passes both loudness
//! checks but has no energy contour.

use serde::{Deserialize, Serialize};

use crate::audio::{energy, AudioSignal};

/// Outcome of the quality gate. Anything but `Usable` ends the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityVerdict {
    Usable,
    TooShort,
    TooSoft,
    TooNoisy,
}

impl QualityVerdict {
    pub fn is_usable(self) -> bool {
        self == QualityVerdict::Usable
    }

    /// Wire name reported in the `emotion` field of a rejection.
    pub fn as_str(self) -> &'static str {
        match self {
            QualityVerdict::Usable => "usable",
            QualityVerdict::TooShort => "too_short",
            QualityVerdict::TooSoft => "too_soft",
            QualityVerdict::TooNoisy => "too_noisy",
        }
    }

    /// Inverse of [`QualityVerdict::as_str`] for the three rejection names.
    pub fn from_rejection(name: &str) -> Option<Self> {
        match name {
            "too_short" => Some(QualityVerdict::TooShort),
            "too_soft" => Some(QualityVerdict::TooSoft),
            "too_noisy" => Some(QualityVerdict::TooNoisy),
            _ => None,
        }
    }
}

impl std::fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable thresholds for [`QualityGate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct QualityThresholds {
    /// Minimum clip duration in seconds. Default: 1.0.
    pub min_duration_secs: f64,
    /// Minimum mean absolute amplitude. Default: 0.0025.
    pub volume_threshold: f32,
    /// Minimum peak absolute amplitude. Default: 0.02.
    pub peak_threshold: f32,
    /// Minimum standard deviation of frame RMS energy. Default: 0.005.
    pub energy_std_threshold: f32,
    /// Energy analysis frame length in samples. Default: 2048.
    pub frame_length: usize,
    /// Energy analysis hop in samples. Default: 512.
    pub hop_length: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_duration_secs: 1.0,
            volume_threshold: 0.0025,
            peak_threshold: 0.02,
            energy_std_threshold: 0.005,
            frame_length: energy::FRAME_LENGTH,
            hop_length: energy::HOP_LENGTH,
        }
    }
}

impl QualityThresholds {
    pub fn normalize(&mut self) {
        self.min_duration_secs = self.min_duration_secs.clamp(0.0, 60.0);
        self.volume_threshold = self.volume_threshold.clamp(0.0, 1.0);
        self.peak_threshold = self.peak_threshold.clamp(0.0, 1.0);
        self.energy_std_threshold = self.energy_std_threshold.clamp(0.0, 1.0);
        self.frame_length = self.frame_length.clamp(16, 1 << 16);
        self.hop_length = self.hop_length.clamp(1, self.frame_length);
    }
}

/// Measurements behind a verdict, reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub duration_secs: f64,
    pub mean_abs: f32,
    pub peak: f32,
    /// `None` when an earlier check already decided the verdict.
    pub energy_std: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn assess(&self, signal: &AudioSignal) -> QualityVerdict {
        self.evaluate(signal).0
    }

    /// Run the checks in order, returning the verdict and what was measured.
    pub fn evaluate(&self, signal: &AudioSignal) -> (QualityVerdict, QualityMetrics) {
        let t = &self.thresholds;
        let mut metrics = QualityMetrics {
            duration_secs: signal.duration_secs(),
            mean_abs: 0.0,
            peak: 0.0,
            energy_std: None,
        };

        if metrics.duration_secs < t.min_duration_secs {
            return (QualityVerdict::TooShort, metrics);
        }

        metrics.mean_abs = energy::mean_abs(&signal.samples);
        metrics.peak = energy::peak(&signal.samples);
        if metrics.mean_abs < t.volume_threshold {
            return (QualityVerdict::TooSoft, metrics);
        }
        if metrics.peak < t.peak_threshold {
            return (QualityVerdict::TooNoisy, metrics);
        }

        let frames = energy::frame_rms(&signal.samples, t.frame_length, t.hop_length);
        let energy_std = energy::std_dev(&frames);
        metrics.energy_std = Some(energy_std);
        if energy_std < t.energy_std_threshold {
            return (QualityVerdict::TooNoisy, metrics);
        }

        (QualityVerdict::Usable, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CANONICAL_SAMPLE_RATE;

    const SR: usize = CANONICAL_SAMPLE_RATE as usize;

    fn constant(amplitude: f32, secs: f64) -> AudioSignal {
        let n = (secs * SR as f64) as usize;
        AudioSignal::new(vec![amplitude; n], CANONICAL_SAMPLE_RATE)
    }

    /// 220 Hz tone with a slow 2 Hz envelope, so frame energy varies.
    fn modulated_tone(amplitude: f32, secs: f64) -> AudioSignal {
        let n = (secs * SR as f64) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / SR as f32;
                let env = 0.5 + 0.5 * (2.0 * std::f32::consts::PI * 2.0 * t).sin();
                amplitude * env * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
            })
            .collect();
        AudioSignal::new(samples, CANONICAL_SAMPLE_RATE)
    }

    #[test]
    fn duration_check_takes_priority() {
        let gate = QualityGate::default();
        // Soft, flat and short at once: duration wins.
        assert_eq!(gate.assess(&constant(0.0001, 0.5)), QualityVerdict::TooShort);
        assert_eq!(gate.assess(&constant(0.9, 0.5)), QualityVerdict::TooShort);
    }

    #[test]
    fn quiet_clip_is_too_soft() {
        let gate = QualityGate::default();
        assert_eq!(gate.assess(&constant(0.001, 10.0)), QualityVerdict::TooSoft);
    }

    #[test]
    fn low_peak_is_too_noisy() {
        // Mean |x| passes (0.01 > 0.0025) but peak 0.01 < 0.02.
        let gate = QualityGate::default();
        let (verdict, metrics) = gate.evaluate(&constant(0.01, 2.0));
        assert_eq!(verdict, QualityVerdict::TooNoisy);
        assert!(metrics.energy_std.is_none());
    }

    #[test]
    fn flat_energy_is_too_noisy() {
        let gate = QualityGate::default();
        let (verdict, metrics) = gate.evaluate(&constant(0.5, 3.0));
        assert_eq!(verdict, QualityVerdict::TooNoisy);
        assert!(metrics.energy_std.unwrap() < 1e-4);
    }

    #[test]
    fn modulated_speech_like_signal_is_usable() {
        let gate = QualityGate::default();
        let (verdict, metrics) = gate.evaluate(&modulated_tone(0.4, 4.0));
        assert_eq!(verdict, QualityVerdict::Usable);
        assert!(metrics.energy_std.unwrap() > 0.005);
    }

    #[test]
    fn exactly_one_second_is_not_too_short() {
        let gate = QualityGate::default();
        assert_ne!(gate.assess(&modulated_tone(0.4, 1.0)), QualityVerdict::TooShort);
    }

    #[test]
    fn thresholds_are_tunable() {
        let gate = QualityGate::new(QualityThresholds {
            min_duration_secs: 5.0,
            ..QualityThresholds::default()
        });
        assert_eq!(gate.assess(&modulated_tone(0.4, 4.0)), QualityVerdict::TooShort);
    }

    #[test]
    fn verdict_wire_names() {
        assert_eq!(QualityVerdict::TooShort.as_str(), "too_short");
        assert_eq!(
            serde_json::to_value(QualityVerdict::TooNoisy).unwrap(),
            "too_noisy"
        );
        assert_eq!(
            QualityVerdict::from_rejection("too_soft"),
            Some(QualityVerdict::TooSoft)
        );
        assert_eq!(QualityVerdict::from_rejection("happy"), None);
    }
}
