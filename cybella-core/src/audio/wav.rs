//! WAV decoding into an [`AudioSignal`] at the canonical rate.

use std::path::Path;

use tracing::debug;

use super::{resample::resample, AudioSignal};
use crate::error::{CybellaError, Result};

/// Decode a PCM or float WAV file and down-mix to mono, keeping its native rate.
pub fn read_wav_mono_f32(path: &Path) -> Result<AudioSignal> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| CybellaError::AudioDecode(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| CybellaError::AudioDecode(e.to_string())))
            .collect::<Result<Vec<_>>>()?,
        hound::SampleFormat::Int => {
            // Full scale for the file's own depth; 8-bit arrives as -128..=127.
            let max = ((1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) - 1).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| (v as f32) / max)
                        .map_err(|e| CybellaError::AudioDecode(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?
        }
    };

    if channels == 1 {
        return Ok(AudioSignal::new(interleaved, spec.sample_rate));
    }

    let mut mono = Vec::with_capacity(interleaved.len() / channels);
    for frame in interleaved.chunks(channels) {
        let sum = frame.iter().copied().sum::<f32>();
        mono.push(sum / channels as f32);
    }
    Ok(AudioSignal::new(mono, spec.sample_rate))
}

/// Read a WAV file and bring it to `target_rate`, optionally peak-normalised.
///
/// This is the ingestion path used by the CLI and the evaluation binary.
pub fn load_for_inference(path: &Path, target_rate: u32, normalize: bool) -> Result<AudioSignal> {
    let decoded = read_wav_mono_f32(path)?;
    let source_rate = decoded.sample_rate;
    let samples = resample(&decoded.samples, source_rate, target_rate)?;
    let mut signal = AudioSignal::new(samples, target_rate);
    if normalize {
        signal.normalize_peak();
    }
    debug!(
        path = %path.display(),
        source_rate,
        target_rate,
        samples = signal.len(),
        normalize,
        "loaded audio"
    );
    Ok(signal)
}
