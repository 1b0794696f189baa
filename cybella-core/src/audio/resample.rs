//! Audio sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! ## Design
//!
//! Recordings arrive at whatever rate the client captured (commonly 44.1 or
//! 48 kHz). The embedding model requires 16 kHz mono f32. `RateConverter`
//! bridges that gap before the signal reaches the pipeline.
//!
//! When source rate == target rate, `RateConverter` is a passthrough, no
//! rubato session is created at all.
//!
//! ## Usage
//!
//! ```ignore
//! let out = resample(&raw_samples, 48_000, 16_000)?; // Vec<f32> at 16 kHz
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::{CybellaError, Result};

/// Input frame count per rubato call for whole-file conversion.
const CHUNK_SIZE: usize = 1024;

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Accumulation buffer; holds partial input chunks between calls.
    input_buf: Vec<f32>,
    /// How many input samples rubato expects per process call.
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// Create a new converter.
    ///
    /// # Errors
    /// Returns `CybellaError::Resample` if rubato fails to initialise.
    pub fn new(source_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(CybellaError::Resample(format!(
                "invalid rates: {source_rate} Hz -> {target_rate} Hz"
            )));
        }
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| CybellaError::Resample(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        debug!(source_rate, target_rate, chunk_size, max_out, "resampler ready");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
        })
    }

    /// Process incoming samples, returning resampled output (may be empty).
    ///
    /// Samples are accumulated internally until a full `chunk_size` block is
    /// available for rubato. Any remainder is kept for the next call or for
    /// [`RateConverter::finish`].
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(ref mut resampler) = self.resampler else {
            return Ok(samples.to_vec());
        };

        self.input_buf.extend_from_slice(samples);

        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];
            let (_consumed, produced) = resampler
                .process_into_buffer(&[input_slice], &mut self.output_buf, None)
                .map_err(|e| CybellaError::Resample(e.to_string()))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);
            self.input_buf.drain(..self.chunk_size);
        }

        Ok(result)
    }

    /// Flush the buffered remainder plus the resampler's internal delay line.
    pub fn finish(&mut self) -> Result<Vec<f32>> {
        let Some(ref mut resampler) = self.resampler else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        if !self.input_buf.is_empty() {
            let tail: [&[f32]; 1] = [&self.input_buf];
            let (_consumed, produced) = resampler
                .process_partial_into_buffer(Some(&tail[..]), &mut self.output_buf, None)
                .map_err(|e| CybellaError::Resample(e.to_string()))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);
            self.input_buf.clear();
        }

        let (_consumed, produced) = resampler
            .process_partial_into_buffer(None::<&[&[f32]]>, &mut self.output_buf, None)
            .map_err(|e| CybellaError::Resample(e.to_string()))?;
        result.extend_from_slice(&self.output_buf[0][..produced]);
        Ok(result)
    }

    /// Output samples the resampler emits before the first real sample.
    pub fn output_delay(&self) -> usize {
        self.resampler.as_ref().map_or(0, |r| r.output_delay())
    }

    /// Returns `true` when source rate == target rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

/// Convert a whole mono signal from `source_rate` to `target_rate`.
///
/// The output is delay-compensated and exactly
/// `round(len * target_rate / source_rate)` samples long.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    let mut rc = RateConverter::new(source_rate, target_rate, CHUNK_SIZE)?;
    if rc.is_passthrough() {
        return Ok(samples.to_vec());
    }

    let expected =
        (samples.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    let delay = rc.output_delay();

    let mut out = rc.process(samples)?;
    out.extend(rc.finish()?);

    let mut out: Vec<f32> = out.into_iter().skip(delay).collect();
    out.resize(expected, 0.0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_identity() {
        let mut rc = RateConverter::new(16_000, 16_000, 960).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        let out = rc.process(&samples).unwrap();
        assert_eq!(out, samples);
        assert!(rc.finish().unwrap().is_empty());
    }

    #[test]
    fn partial_accumulation_returns_empty() {
        let mut rc = RateConverter::new(48_000, 16_000, 960).unwrap();
        // Fewer than chunk_size samples → nothing output yet
        let out = rc.process(&vec![0.0f32; 500]).unwrap();
        assert!(
            out.is_empty(),
            "expected empty output for partial chunk, got {}",
            out.len()
        );
    }

    #[test]
    fn whole_signal_48k_to_16k_has_exact_length() {
        let samples = vec![0.1f32; 48_000 * 2 + 123];
        let out = resample(&samples, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 32_041);
    }

    #[test]
    fn whole_signal_keeps_dc_level() {
        let samples = vec![0.25f32; 44_100];
        let out = resample(&samples, 44_100, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
        // Away from the edges a constant input stays constant.
        let mid = &out[4_000..12_000];
        assert!(mid.iter().all(|s| (s - 0.25).abs() < 1e-2));
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(matches!(
            RateConverter::new(0, 16_000, 960),
            Err(CybellaError::Resample(_))
        ));
    }
}
