use crate::ensemble::Aggregate;
use crate::inference::{LabelSet, ProbabilityVector};

use super::{PredictionResult, RankedEmotion, SegmentResult};

/// Lower-cases a native label and maps `fear` onto `fearful`.
pub fn normalize_label(label: &str) -> String {
    let lower = label.trim().to_lowercase();
    if lower == "fear" {
        "fearful".to_string()
    } else {
        lower
    }
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn label_name(labels: &LabelSet, index: usize) -> String {
    // Out-of-range indices are caught by distribution validation upstream.
    labels
        .get(index)
        .map(normalize_label)
        .unwrap_or_else(|| format!("label_{index}"))
}

/// Build the final result from per-window distributions (time order) and
/// their aggregate.
pub fn assemble(
    labels: &LabelSet,
    vectors: &[ProbabilityVector],
    aggregate: &Aggregate,
    window_secs: f64,
) -> PredictionResult {
    let segments = vectors
        .iter()
        .enumerate()
        .filter_map(|(index, v)| {
            let (label_index, p) = v.argmax()?;
            let start = round1(index as f64 * window_secs);
            Some(SegmentResult {
                start,
                end: start + window_secs,
                emotion: label_name(labels, label_index),
                confidence: round4(f64::from(p)),
            })
        })
        .collect();

    let top3 = aggregate
        .ranking
        .iter()
        .map(|&(index, p)| RankedEmotion {
            emotion: label_name(labels, index),
            confidence: round4(p),
        })
        .collect();

    PredictionResult {
        emotion: label_name(labels, aggregate.label_index),
        confidence: round4(aggregate.confidence),
        top3,
        segments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{aggregate, AggregationStrategy};
    use approx::assert_abs_diff_eq;

    fn labels() -> LabelSet {
        LabelSet::new(["Angry", "Fear", "happy"]).unwrap()
    }

    #[test]
    fn fear_becomes_fearful_everywhere() {
        assert_eq!(normalize_label("Fear"), "fearful");
        assert_eq!(normalize_label("FEAR"), "fearful");
        assert_eq!(normalize_label("Fearful"), "fearful");
        assert_eq!(normalize_label("Happy"), "happy");

        let vectors = vec![
            ProbabilityVector::new(vec![0.1, 0.8, 0.1]),
            ProbabilityVector::new(vec![0.2, 0.6, 0.2]),
        ];
        let agg = aggregate(&vectors, AggregationStrategy::Average).unwrap();
        let result = assemble(&labels(), &vectors, &agg, 3.0);
        assert_eq!(result.emotion, "fearful");
        assert_eq!(result.top3[0].emotion, "fearful");
        assert!(result.segments.iter().all(|s| s.emotion == "fearful"));
        assert!(result
            .top3
            .iter()
            .all(|r| r.emotion.chars().all(|c| !c.is_uppercase())));
    }

    #[test]
    fn segments_sit_on_a_fixed_timeline() {
        let vectors = vec![
            ProbabilityVector::new(vec![0.7, 0.2, 0.1]),
            ProbabilityVector::new(vec![0.1, 0.2, 0.7]),
            ProbabilityVector::new(vec![0.3, 0.4, 0.3]),
        ];
        let agg = aggregate(&vectors, AggregationStrategy::Average).unwrap();
        let result = assemble(&labels(), &vectors, &agg, 3.0);

        let times: Vec<(f64, f64)> = result.segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(times, vec![(0.0, 3.0), (3.0, 6.0), (6.0, 9.0)]);
        assert_eq!(result.segments[0].emotion, "angry");
        assert_eq!(result.segments[1].emotion, "happy");
        assert_eq!(result.segments[2].emotion, "fearful");
    }

    #[test]
    fn probabilities_are_rounded_to_four_decimals() {
        assert_abs_diff_eq!(round4(0.123_456), 0.1235, epsilon = 1e-12);
        assert_abs_diff_eq!(round1(3.0 * 1.5), 4.5, epsilon = 1e-12);

        let vectors = vec![ProbabilityVector::new(vec![0.333_333, 0.333_334, 0.333_333])];
        let agg = aggregate(&vectors, AggregationStrategy::Average).unwrap();
        let result = assemble(&labels(), &vectors, &agg, 3.0);
        assert_abs_diff_eq!(result.confidence, 0.3333, epsilon = 1e-9);
        assert_abs_diff_eq!(result.segments[0].confidence, 0.3333, epsilon = 1e-9);
    }

    #[test]
    fn serialised_shape_matches_the_wire_format() {
        let vectors = vec![ProbabilityVector::new(vec![0.5, 0.25, 0.25])];
        let agg = aggregate(&vectors, AggregationStrategy::Average).unwrap();
        let json = serde_json::to_value(assemble(&labels(), &vectors, &agg, 3.0)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "emotion": "angry",
                "confidence": 0.5,
                "top3": [
                    {"emotion": "angry", "confidence": 0.5},
                    {"emotion": "fearful", "confidence": 0.25},
                    {"emotion": "happy", "confidence": 0.25}
                ],
                "segments": [
                    {"start": 0.0, "end": 3.0, "emotion": "angry", "confidence": 0.5}
                ]
            })
        );
    }
}
