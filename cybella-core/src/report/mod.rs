//! The structured outcome handed back to callers.
//!
//! ```json
//! { "emotion": "happy", "confidence": 0.8123,
//!   "top3": [{"emotion": "happy", "confidence": 0.8123}, ...],
//!   "segments": [{"start": 0.0, "end": 3.0, "emotion": "happy", "confidence": 0.9}] }
//! ```
//!
//! Rejections are ordinary results: `emotion` carries the verdict name,
//! `confidence` is 0.0, `segments` is empty and `top3` is omitted.

pub mod assemble;

pub use assemble::{assemble, normalize_label};

use serde::{Deserialize, Serialize};

use crate::quality::QualityVerdict;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub emotion: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top3: Vec<RankedEmotion>,
    pub segments: Vec<SegmentResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEmotion {
    pub emotion: String,
    pub confidence: f64,
}

/// One window's own arg-max, placed on the timeline in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub start: f64,
    pub end: f64,
    pub emotion: String,
    pub confidence: f64,
}

impl PredictionResult {
    pub fn rejected(verdict: QualityVerdict) -> Self {
        Self {
            emotion: verdict.as_str().to_string(),
            confidence: 0.0,
            top3: Vec::new(),
            segments: Vec::new(),
        }
    }

    /// The verdict behind this result, if it is a rejection.
    pub fn rejection(&self) -> Option<QualityVerdict> {
        if !self.segments.is_empty() {
            return None;
        }
        QualityVerdict::from_rejection(&self.emotion)
    }

    pub fn is_rejection(&self) -> bool {
        self.rejection().is_some()
    }
}
