//! Audio signal type and ingestion helpers.
//!
//! Everything downstream of ingestion works on an [`AudioSignal`]: mono f32
//! samples at the canonical 16 kHz rate. Decoding, down-mixing and
//! resampling happen here, before the pipeline sees any audio.

pub mod energy;
pub mod resample;
pub mod wav;

use crate::error::{CybellaError, Result};

/// Sample rate every model and every duration constant assumes (Hz).
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;

/// A contiguous block of mono PCM samples at a known sample rate.
///
/// Owned by exactly one prediction; never shared between invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    /// Mono f32 samples, roughly in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this signal in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples spanning `secs` at this signal's rate.
    pub fn samples_for(&self, secs: f64) -> usize {
        samples_for(secs, self.sample_rate)
    }

    /// Reject signals the pipeline cannot analyse: empty, non-finite, or at
    /// a rate other than `expected_rate`.
    pub fn validate(&self, expected_rate: u32) -> Result<()> {
        if self.sample_rate != expected_rate {
            return Err(CybellaError::SampleRateMismatch {
                expected: expected_rate,
                actual: self.sample_rate,
            });
        }
        if self.samples.is_empty() {
            return Err(CybellaError::EmptySignal);
        }
        if let Some(index) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(CybellaError::NonFiniteSample { index });
        }
        Ok(())
    }

    /// Scale so the loudest sample sits at ±1.0. Silent signals are left as-is.
    pub fn normalize_peak(&mut self) {
        let peak = energy::peak(&self.samples);
        if peak > 0.0 && peak.is_finite() {
            let gain = 1.0 / peak;
            for s in &mut self.samples {
                *s *= gain;
            }
        }
    }
}

/// Number of samples spanning `secs` at `sample_rate`.
pub fn samples_for(secs: f64, sample_rate: u32) -> usize {
    (secs.max(0.0) * sample_rate as f64).round() as usize
}
