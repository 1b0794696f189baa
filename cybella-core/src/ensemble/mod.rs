//! Combining per-window distributions into one decision.
//!
//! ```text
//! Average      mean of all windows → arg-max
//! BestSegment  window with the most confident arg-max, taken as-is
//! ```
//!
//! Arithmetic happens in `f64`; ties always resolve towards the lower native
//! label index (and, for `BestSegment`, the earlier window).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CybellaError, Result};
use crate::inference::ProbabilityVector;

/// Number of entries in the reported ranking.
pub const TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    #[default]
    Average,
    BestSegment,
}

impl AggregationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::BestSegment => "best_segment",
        }
    }
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationStrategy {
    type Err = CybellaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "average" | "avg" | "mean" => Ok(Self::Average),
            "best_segment" | "best-segment" | "best" => Ok(Self::BestSegment),
            other => Err(CybellaError::Config(format!(
                "unknown aggregation strategy '{other}' (expected 'average' or 'best_segment')"
            ))),
        }
    }
}

/// Outcome of [`aggregate`], still in native label indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub label_index: usize,
    pub confidence: f64,
    /// The distribution the decision was read from.
    pub distribution: Vec<f64>,
    /// Up to [`TOP_K`] `(label_index, probability)`, descending.
    pub ranking: Vec<(usize, f64)>,
    /// Window chosen by `BestSegment`; `None` for `Average`.
    pub source_window: Option<usize>,
}

pub fn aggregate(vectors: &[ProbabilityVector], strategy: AggregationStrategy) -> Result<Aggregate> {
    if vectors.is_empty() {
        return Err(CybellaError::EmptyAggregation);
    }
    let width = vectors[0].len();
    if width == 0 {
        return Err(CybellaError::InvalidDistribution {
            window: 0,
            reason: "distribution is empty".into(),
        });
    }
    if let Some(window) = vectors.iter().position(|v| v.len() != width) {
        return Err(CybellaError::InvalidDistribution {
            window,
            reason: format!("expected {width} probabilities, got {}", vectors[window].len()),
        });
    }

    let (distribution, source_window) = match strategy {
        AggregationStrategy::Average => (mean_distribution(vectors, width), None),
        AggregationStrategy::BestSegment => {
            let window = most_confident_window(vectors);
            let dist = vectors[window].as_slice().iter().map(|&p| f64::from(p)).collect();
            (dist, Some(window))
        }
    };

    let (label_index, confidence) = argmax(&distribution);
    let ranking = top_k(&distribution, TOP_K);

    Ok(Aggregate {
        label_index,
        confidence,
        distribution,
        ranking,
        source_window,
    })
}

fn mean_distribution(vectors: &[ProbabilityVector], width: usize) -> Vec<f64> {
    let mut sums = vec![0.0f64; width];
    for v in vectors {
        for (acc, &p) in sums.iter_mut().zip(v.as_slice()) {
            *acc += f64::from(p);
        }
    }
    let n = vectors.len() as f64;
    sums.into_iter().map(|s| s / n).collect()
}

fn most_confident_window(vectors: &[ProbabilityVector]) -> usize {
    let mut best = (0usize, f32::NEG_INFINITY);
    for (i, v) in vectors.iter().enumerate() {
        if let Some((_, p)) = v.argmax() {
            if p > best.1 {
                best = (i, p);
            }
        }
    }
    best.0
}

fn argmax(distribution: &[f64]) -> (usize, f64) {
    let mut best = (0usize, distribution[0]);
    for (i, &p) in distribution.iter().enumerate().skip(1) {
        if p > best.1 {
            best = (i, p);
        }
    }
    best
}

/// The `k` most probable labels, descending; equal probabilities keep native order.
pub fn top_k(distribution: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = distribution.iter().copied().enumerate().collect();
    // `sort_by` is stable, so ties stay in index order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pv(values: &[f32]) -> ProbabilityVector {
        ProbabilityVector::new(values.to_vec())
    }

    #[test]
    fn average_of_one_window_is_that_window() {
        let v = pv(&[0.1, 0.6, 0.3]);
        let agg = aggregate(std::slice::from_ref(&v), AggregationStrategy::Average).unwrap();
        assert_eq!(agg.label_index, 1);
        for (a, &b) in agg.distribution.iter().zip(v.as_slice()) {
            assert_abs_diff_eq!(*a, f64::from(b), epsilon = 1e-9);
        }
        assert_eq!(agg.source_window, None);
    }

    #[test]
    fn average_preserves_normalisation() {
        let vectors = vec![
            pv(&[0.7, 0.2, 0.1]),
            pv(&[0.1, 0.8, 0.1]),
            pv(&[0.25, 0.25, 0.5]),
        ];
        let agg = aggregate(&vectors, AggregationStrategy::Average).unwrap();
        let sum: f64 = agg.distribution.iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-3);
        assert_eq!(agg.label_index, 1);
        assert_abs_diff_eq!(agg.confidence, (0.2 + 0.8 + 0.25) / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn best_segment_uses_the_most_confident_window() {
        let vectors = vec![pv(&[0.6, 0.4]), pv(&[0.05, 0.95]), pv(&[0.7, 0.3])];
        let agg = aggregate(&vectors, AggregationStrategy::BestSegment).unwrap();
        assert_eq!(agg.source_window, Some(1));
        assert_eq!(agg.label_index, 1);
        assert_abs_diff_eq!(agg.confidence, 0.95, epsilon = 1e-6);
        assert_eq!(agg.ranking[0].0, 1);
        assert_eq!(agg.ranking[1].0, 0);
    }

    #[test]
    fn best_segment_prefers_earlier_window_on_ties() {
        let vectors = vec![pv(&[0.9, 0.1]), pv(&[0.1, 0.9])];
        let agg = aggregate(&vectors, AggregationStrategy::BestSegment).unwrap();
        assert_eq!(agg.source_window, Some(0));
        assert_eq!(agg.label_index, 0);
    }

    #[test]
    fn ranking_ties_follow_native_order() {
        let ranking = top_k(&[0.2, 0.3, 0.2, 0.3], 3);
        assert_eq!(
            ranking.iter().map(|r| r.0).collect::<Vec<_>>(),
            vec![1, 3, 0]
        );
    }

    #[test]
    fn ranking_is_shorter_with_fewer_labels() {
        let agg = aggregate(&[pv(&[0.4, 0.6])], AggregationStrategy::Average).unwrap();
        assert_eq!(agg.ranking.len(), 2);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            aggregate(&[], AggregationStrategy::Average),
            Err(CybellaError::EmptyAggregation)
        ));
    }

    #[test]
    fn mismatched_widths_are_rejected() {
        let err = aggregate(&[pv(&[0.5, 0.5]), pv(&[1.0])], AggregationStrategy::Average)
            .unwrap_err();
        assert!(matches!(err, CybellaError::InvalidDistribution { window: 1, .. }));
    }

    #[test]
    fn strategy_parses_and_serialises() {
        assert_eq!(
            "best-segment".parse::<AggregationStrategy>().unwrap(),
            AggregationStrategy::BestSegment
        );
        assert_eq!(
            " Average ".parse::<AggregationStrategy>().unwrap(),
            AggregationStrategy::Average
        );
        assert!("median".parse::<AggregationStrategy>().is_err());
        assert_eq!(
            serde_json::to_string(&AggregationStrategy::BestSegment).unwrap(),
            "\"best_segment\""
        );
        assert_eq!(AggregationStrategy::default(), AggregationStrategy::Average);
    }
}
