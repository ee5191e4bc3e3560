//! Binary classification metrics over a predictions file

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

const TRUE_COLUMN: &str = "y_true";
const PRED_COLUMN: &str = "y_pred";

/// The positive class label
const POSITIVE: &str = "1";

/// Confusion counts for the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl ConfusionCounts {
    pub fn record(&mut self, actual: &str, predicted: &str) {
        match (actual.trim() == POSITIVE, predicted.trim() == POSITIVE) {
            (true, true) => self.true_positives += 1,
            (false, true) => self.false_positives += 1,
            (true, false) => self.false_negatives += 1,
            (false, false) => {}
        }
    }

    pub fn metrics(&self) -> ClassificationMetrics {
        precision_recall_f1(self.true_positives, self.false_positives, self.false_negatives)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Ratios that would divide by zero are reported as 0
pub fn precision_recall_f1(tp: u64, fp: u64, fn_: u64) -> ClassificationMetrics {
    let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    ClassificationMetrics {
        precision,
        recall,
        f1,
    }
}

/// Count outcomes in a CSV with `y_true` and `y_pred` columns
pub fn evaluate_predictions(path: &Path) -> E2eResult<ConfusionCounts> {
    if !path.exists() {
        return Err(E2eError::PredictionsNotFound(path.display().to_string()));
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (actual_idx, predicted_idx) = match (column(TRUE_COLUMN), column(PRED_COLUMN)) {
        (Some(a), Some(p)) => (a, p),
        _ => {
            return Err(E2eError::MissingPredictionColumns {
                path: path.display().to_string(),
                found: headers.clone(),
            })
        }
    };

    let mut counts = ConfusionCounts::default();
    let mut rows = 0usize;
    for record in reader.records() {
        let record = record?;
        counts.record(
            record.get(actual_idx).unwrap_or_default(),
            record.get(predicted_idx).unwrap_or_default(),
        );
        rows += 1;
    }
    debug!("Evaluated {} prediction(s) from {}: {:?}", rows, path.display(), counts);
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(8, 2, 2, 0.8, 0.8, 0.8; "balanced")]
    #[test_case(3, 1, 0, 0.75, 1.0, 6.0 / 7.0; "no misses")]
    #[test_case(0, 0, 0, 0.0, 0.0, 0.0; "empty")]
    #[test_case(0, 0, 4, 0.0, 0.0, 0.0; "nothing predicted positive")]
    #[test_case(0, 5, 0, 0.0, 0.0, 0.0; "no actual positives")]
    #[test_case(0, 2, 3, 0.0, 0.0, 0.0; "all wrong")]
    fn test_precision_recall_f1(tp: u64, fp: u64, fn_: u64, p: f64, r: f64, f1: f64) {
        let m = precision_recall_f1(tp, fp, fn_);
        assert!((m.precision - p).abs() < 1e-9, "precision {}", m.precision);
        assert!((m.recall - r).abs() < 1e-9, "recall {}", m.recall);
        assert!((m.f1 - f1).abs() < 1e-9, "f1 {}", m.f1);
    }

    #[test_case("1", "1", (1, 0, 0))]
    #[test_case(" 1 ", "0", (0, 0, 1))]
    #[test_case("0", "1", (0, 1, 0))]
    #[test_case("yes", "no", (0, 0, 0))]
    fn test_record(actual: &str, predicted: &str, expected: (u64, u64, u64)) {
        let mut counts = ConfusionCounts::default();
        counts.record(actual, predicted);
        assert_eq!(
            (counts.true_positives, counts.false_positives, counts.false_negatives),
            expected
        );
    }

    #[test]
    fn test_evaluate_predictions_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.csv");
        std::fs::write(&path, "id, y_true ,y_pred\na,1,1\nb,1,0\nc,0,1\nd,0,0\ne,1,1\n").unwrap();

        let counts = evaluate_predictions(&path).unwrap();
        assert_eq!(
            counts,
            ConfusionCounts {
                true_positives: 2,
                false_positives: 1,
                false_negatives: 1,
            }
        );
        let m = counts.metrics();
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_predictions_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            evaluate_predictions(&dir.path().join("absent.csv")),
            Err(E2eError::PredictionsNotFound(_))
        ));

        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "label,score\n1,0.4\n").unwrap();
        match evaluate_predictions(&path) {
            Err(E2eError::MissingPredictionColumns { found, .. }) => {
                assert_eq!(found, vec!["label", "score"])
            }
            other => panic!("expected MissingPredictionColumns, got {:?}", other),
        }
    }
}
