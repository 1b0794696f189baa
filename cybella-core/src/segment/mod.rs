//! Trimming and fixed-duration windowing of a gated signal.
//!
//! Windows are successive, non-overlapping blocks of `window_secs`. A leftover
//! tail of at least `min_remainder_secs` becomes one extra, shorter window;
//! anything shorter is discarded.
//!
//! ```text
//! 7.0 s → [0–3) [3–6) [6–7)
//! 6.5 s → [0–3) [3–6)           (0.5 s tail dropped)
//! ```

pub mod trim;

pub use trim::{SilenceTrimmer, TrimPolicy};

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::audio::AudioSignal;

/// Tunable constants for [`WindowSegmenter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct WindowPolicy {
    /// Nominal window duration. Default: 3.0 s.
    pub window_secs: f64,
    /// Shortest tail that still becomes a window. Default: 1.0 s.
    pub min_remainder_secs: f64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            window_secs: 3.0,
            min_remainder_secs: 1.0,
        }
    }
}

impl WindowPolicy {
    pub fn normalize(&mut self) {
        self.window_secs = self.window_secs.clamp(0.1, 60.0);
        self.min_remainder_secs = self.min_remainder_secs.clamp(0.0, self.window_secs);
    }
}

/// A contiguous sub-range of an [`AudioSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Position in time order, starting at 0.
    pub index: usize,
    pub start_sample: usize,
    /// Exclusive.
    pub end_sample: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end_sample - self.start_sample
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start_sample..self.end_sample
    }

    pub fn samples<'a>(&self, signal: &'a AudioSignal) -> &'a [f32] {
        &signal.samples[self.range()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct WindowSegmenter {
    policy: WindowPolicy,
}

impl WindowSegmenter {
    pub fn new(policy: WindowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    pub fn segment(&self, signal: &AudioSignal) -> Vec<Window> {
        let window_len = signal.samples_for(self.policy.window_secs).max(1);
        let min_remainder = signal.samples_for(self.policy.min_remainder_secs);
        let total = signal.len();

        let full = total / window_len;
        let remainder = total % window_len;

        let mut windows: Vec<Window> = (0..full)
            .map(|index| Window {
                index,
                start_sample: index * window_len,
                end_sample: (index + 1) * window_len,
            })
            .collect();

        if remainder > 0 && remainder >= min_remainder {
            windows.push(Window {
                index: full,
                start_sample: full * window_len,
                end_sample: total,
            });
        }

        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CANONICAL_SAMPLE_RATE;

    const SR: usize = CANONICAL_SAMPLE_RATE as usize;

    fn silence(n: usize) -> AudioSignal {
        AudioSignal::new(vec![0.0; n], CANONICAL_SAMPLE_RATE)
    }

    fn bounds(windows: &[Window]) -> Vec<(usize, usize)> {
        windows.iter().map(|w| (w.start_sample, w.end_sample)).collect()
    }

    #[test]
    fn seven_seconds_yields_three_windows() {
        let windows = WindowSegmenter::default().segment(&silence(7 * SR));
        assert_eq!(
            bounds(&windows),
            vec![(0, 3 * SR), (3 * SR, 6 * SR), (6 * SR, 7 * SR)]
        );
        assert_eq!(windows[2].index, 2);
        assert_eq!(windows[2].len(), SR);
    }

    #[test]
    fn six_and_a_half_seconds_drops_the_tail() {
        let windows = WindowSegmenter::default().segment(&silence(6 * SR + SR / 2));
        assert_eq!(bounds(&windows), vec![(0, 3 * SR), (3 * SR, 6 * SR)]);
    }

    #[test]
    fn exact_multiple_has_no_remainder_window() {
        let windows = WindowSegmenter::default().segment(&silence(9 * SR));
        assert_eq!(windows.len(), 3);
    }

    #[test]
    fn short_signal_becomes_single_partial_window() {
        let windows = WindowSegmenter::default().segment(&silence(2 * SR + SR / 2));
        assert_eq!(bounds(&windows), vec![(0, 2 * SR + SR / 2)]);
    }

    #[test]
    fn sub_second_signal_yields_nothing() {
        assert!(WindowSegmenter::default().segment(&silence(SR / 2)).is_empty());
        assert!(WindowSegmenter::default().segment(&silence(0)).is_empty());
    }

    #[test]
    fn window_slices_signal() {
        let signal = AudioSignal::new((0..4 * SR).map(|i| i as f32).collect(), 16_000);
        let windows = WindowSegmenter::default().segment(&signal);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].samples(&signal)[0], (3 * SR) as f32);
    }
}
