//! Short-time energy and amplitude statistics.
//!
//! ## Framing
//!
//! Frame RMS uses fixed, non-centred frames: frame `i` covers
//! `[i * hop, i * hop + frame_len)`. A signal shorter than one frame is a
//! single frame spanning the whole signal; trailing samples that do not fill
//! a complete frame after the first one are ignored.

/// Default analysis frame length (samples).
pub const FRAME_LENGTH: usize = 2048;

/// Default hop between successive frames (samples).
pub const HOP_LENGTH: usize = 512;

/// Compute the root-mean-square of a sample slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Mean absolute amplitude.
pub fn mean_abs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s.abs())).sum();
    (sum / samples.len() as f64) as f32
}

/// Largest absolute amplitude.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// RMS of each analysis frame.
pub fn frame_rms(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    let frame_len = frame_len.max(1);
    let hop = hop.max(1);
    if samples.is_empty() {
        return Vec::new();
    }
    if samples.len() <= frame_len {
        return vec![rms(samples)];
    }
    let n_frames = 1 + (samples.len() - frame_len) / hop;
    (0..n_frames)
        .map(|i| {
            let start = i * hop;
            rms(&samples[start..start + frame_len])
        })
        .collect()
}

/// Population standard deviation.
pub fn std_dev(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    var.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rms_of_square_wave() {
        // A square wave at ±0.5 should have RMS = 0.5
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert_abs_diff_eq!(rms(&samples), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(mean_abs(&[]), 0.0);
        assert_eq!(peak(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert!(frame_rms(&[], FRAME_LENGTH, HOP_LENGTH).is_empty());
    }

    #[test]
    fn mean_abs_and_peak() {
        let samples = [0.1, -0.3, 0.2, -0.4];
        assert_abs_diff_eq!(mean_abs(&samples), 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(peak(&samples), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn short_signal_is_one_frame() {
        let frames = frame_rms(&[0.5; 100], FRAME_LENGTH, HOP_LENGTH);
        assert_eq!(frames.len(), 1);
        assert_abs_diff_eq!(frames[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn frame_count_follows_hop() {
        // (4096 - 2048) / 512 + 1 = 5 frames
        let frames = frame_rms(&vec![0.1; 4096], FRAME_LENGTH, HOP_LENGTH);
        assert_eq!(frames.len(), 5);
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        assert_abs_diff_eq!(std_dev(&[0.3; 10]), 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(std_dev(&[1.0, 3.0]), 1.0, epsilon = 1e-7);
    }
}
