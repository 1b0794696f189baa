//! Scoring the engine against a RAVDESS-style labelled dataset.
//!
//! RAVDESS file names are seven dash-separated numeric fields; the third is
//! the emotion code (`03-01-06-01-02-01-12.wav` → `06` → fearful). Neutral
//! (`01`) and unknown codes are not scored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::engine::EmotionEngine;
use crate::ensemble::AggregationStrategy;
use crate::error::Result;

const RAVDESS_CODES: [(&str, &str); 7] = [
    ("02", "calm"),
    ("03", "happy"),
    ("04", "sad"),
    ("05", "angry"),
    ("06", "fearful"),
    ("07", "disgust"),
    ("08", "surprised"),
];

/// Ground-truth label encoded in a RAVDESS file name, if it is scored.
pub fn ravdess_label(file_name: &str) -> Option<&'static str> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    let code = stem.split('-').nth(2)?;
    RAVDESS_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

/// All `.wav` files under `dir`, recursively, in path order.
pub fn collect_wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
            {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationReport {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    /// One entry per label seen in either column, sorted by label.
    pub per_class: Vec<ClassMetrics>,
    pub macro_f1: f64,
    pub true_distribution: BTreeMap<String, usize>,
    pub predicted_distribution: BTreeMap<String, usize>,
}

impl ClassificationReport {
    /// Build from `(expected, predicted)` pairs.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, S)]) -> Self {
        let mut true_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut predicted_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut true_positive: BTreeMap<String, usize> = BTreeMap::new();

        for (expected, predicted) in pairs {
            let (expected, predicted) = (expected.as_ref(), predicted.as_ref());
            *true_distribution.entry(expected.to_string()).or_default() += 1;
            *predicted_distribution.entry(predicted.to_string()).or_default() += 1;
            if expected == predicted {
                *true_positive.entry(expected.to_string()).or_default() += 1;
            }
        }

        let mut labels: Vec<&String> = true_distribution
            .keys()
            .chain(predicted_distribution.keys())
            .collect();
        labels.sort();
        labels.dedup();

        let per_class: Vec<ClassMetrics> = labels
            .into_iter()
            .map(|label| {
                let tp = true_positive.get(label).copied().unwrap_or(0);
                let support = true_distribution.get(label).copied().unwrap_or(0);
                let predicted = predicted_distribution.get(label).copied().unwrap_or(0);
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let correct: usize = true_positive.values().sum();
        let macro_f1 = if per_class.is_empty() {
            0.0
        } else {
            per_class.iter().map(|c| c.f1).sum::<f64>() / per_class.len() as f64
        };

        Self {
            total: pairs.len(),
            correct,
            accuracy: ratio(correct, pairs.len()),
            per_class,
            macro_f1,
            true_distribution,
            predicted_distribution,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    /// RFC 3339 UTC timestamp.
    pub generated_at: String,
    pub strategy: AggregationStrategy,
    pub files_seen: usize,
    pub skipped_unlabelled: usize,
    pub failed: usize,
    pub report: ClassificationReport,
}

/// Predict every labelled WAV under `dir` and score the results.
///
/// Files that fail to decode or predict are logged and counted, not fatal.
pub fn evaluate_dir(
    engine: &EmotionEngine,
    dir: &Path,
    strategy: AggregationStrategy,
    normalize_peak: bool,
) -> Result<EvaluationReport> {
    let files = collect_wav_files(dir)?;
    info!(dir = %dir.display(), files = files.len(), %strategy, "starting evaluation");

    let mut pairs: Vec<(String, String)> = Vec::with_capacity(files.len());
    let mut skipped_unlabelled = 0usize;
    let mut failed = 0usize;

    for path in &files {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let Some(expected) = ravdess_label(name) else {
            skipped_unlabelled += 1;
            continue;
        };
        let signal = match crate::audio::wav::load_for_inference(
            path,
            engine.config().sample_rate,
            normalize_peak,
        ) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %path.display(), "skipping undecodable file: {e}");
                failed += 1;
                continue;
            }
        };
        match engine.predict_with_strategy(signal, strategy) {
            Ok(result) => pairs.push((expected.to_string(), result.emotion)),
            Err(e) => {
                warn!(path = %path.display(), "prediction failed: {e}");
                failed += 1;
            }
        }
    }

    let report = ClassificationReport::from_pairs(&pairs);
    info!(
        scored = report.total,
        accuracy = report.accuracy,
        skipped_unlabelled,
        failed,
        "evaluation complete"
    );
    Ok(EvaluationReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        strategy,
        files_seen: files.len(),
        skipped_unlabelled,
        failed,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn parses_emotion_code_from_third_field() {
        assert_eq!(ravdess_label("03-01-06-01-02-01-12.wav"), Some("fearful"));
        assert_eq!(ravdess_label("03-01-02-02-01-01-01.wav"), Some("calm"));
        assert_eq!(
            ravdess_label("/data/Actor_12/03-01-08-01-02-01-12.wav"),
            Some("surprised")
        );
    }

    #[test]
    fn neutral_and_malformed_names_are_not_scored() {
        assert_eq!(ravdess_label("03-01-01-01-01-01-01.wav"), None);
        assert_eq!(ravdess_label("03-01-09-01-01-01-01.wav"), None);
        assert_eq!(ravdess_label("recording.wav"), None);
        assert_eq!(ravdess_label(""), None);
    }

    #[test]
    fn report_matches_hand_computed_metrics() {
        let pairs = [
            ("happy", "happy"),
            ("happy", "sad"),
            ("sad", "sad"),
            ("angry", "too_soft"),
        ];
        let report = ClassificationReport::from_pairs(&pairs);
        assert_eq!(report.total, 4);
        assert_eq!(report.correct, 2);
        assert_abs_diff_eq!(report.accuracy, 0.5, epsilon = 1e-12);

        let by_label: BTreeMap<&str, &ClassMetrics> =
            report.per_class.iter().map(|c| (c.label.as_str(), c)).collect();
        assert_eq!(
            by_label.keys().copied().collect::<Vec<_>>(),
            vec!["angry", "happy", "sad", "too_soft"]
        );

        let happy = by_label["happy"];
        assert_abs_diff_eq!(happy.precision, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(happy.recall, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(happy.f1, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(happy.support, 2);

        let sad = by_label["sad"];
        assert_abs_diff_eq!(sad.precision, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(sad.recall, 1.0, epsilon = 1e-12);

        let angry = by_label["angry"];
        assert_eq!(angry.f1, 0.0);
        assert_eq!(by_label["too_soft"].support, 0);

        assert_eq!(report.predicted_distribution["sad"], 2);
        assert_eq!(report.true_distribution["happy"], 2);
    }

    #[test]
    fn empty_report_is_all_zero() {
        let report = ClassificationReport::from_pairs::<&str>(&[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.accuracy, 0.0);
        assert!(report.per_class.is_empty());
    }
}
