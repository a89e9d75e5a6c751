//! Evaluation metrics for the fitted models
//!
//! Includes metrics for:
//! - Classification: accuracy and a per-class report (precision, recall, F1)
//! - Regression: MAE, RMSE, R²

use ndarray::Array1;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Display name of a binary class label
pub fn class_name(label: f64) -> &'static str {
    if label > 0.0 {
        "True"
    } else {
        "False"
    }
}

/// Scores for one class, or an average over classes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 with accuracy and macro/weighted averages
///
/// Serializes as a flat map keyed by class name, `accuracy`, `macro avg` and
/// `weighted avg`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<(String, ClassScores)>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    /// Scores for a class by display name
    pub fn class(&self, name: &str) -> Option<&ClassScores> {
        self.classes.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }
}

impl Serialize for ClassificationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.classes.len() + 3))?;
        for (name, scores) in &self.classes {
            map.serialize_entry(name, scores)?;
        }
        map.serialize_entry("accuracy", &self.accuracy)?;
        map.serialize_entry("macro avg", &self.macro_avg)?;
        map.serialize_entry("weighted avg", &self.weighted_avg)?;
        map.end()
    }
}

/// Regression scores for one fitted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        Self {
            mae: Metrics::mae(y_true, y_pred),
            rmse: Metrics::rmse(y_true, y_pred),
            r2: Metrics::r2(y_true, y_pred),
        }
    }
}

/// Metrics calculator
pub struct Metrics;

impl Metrics {
    // ==================== Classification Metrics ====================

    /// Calculate accuracy: (correct predictions) / (total predictions)
    pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        assert_eq!(y_true.len(), y_pred.len(), "Arrays must have same length");

        if y_true.is_empty() {
            return 0.0;
        }

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| class_name(**t) == class_name(**p))
            .count();

        correct as f64 / y_true.len() as f64
    }

    /// Build the classification report
    ///
    /// Classes are those present in either the truth or the predictions;
    /// a ratio with a zero denominator scores 0.
    pub fn classification_report(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> ClassificationReport {
        assert_eq!(y_true.len(), y_pred.len(), "Arrays must have same length");

        let present: Vec<bool> = [0.0, 1.0]
            .iter()
            .map(|&c| {
                y_true
                    .iter()
                    .chain(y_pred.iter())
                    .any(|&v| class_name(v) == class_name(c))
            })
            .collect();

        let classes: Vec<(String, ClassScores)> = [0.0, 1.0]
            .iter()
            .zip(present)
            .filter(|(_, p)| *p)
            .map(|(&c, _)| (class_name(c).to_string(), Self::class_scores(y_true, y_pred, c)))
            .collect();

        let k = classes.len().max(1) as f64;
        let total: usize = classes.iter().map(|(_, s)| s.support).sum();

        let macro_avg = ClassScores {
            precision: classes.iter().map(|(_, s)| s.precision).sum::<f64>() / k,
            recall: classes.iter().map(|(_, s)| s.recall).sum::<f64>() / k,
            f1_score: classes.iter().map(|(_, s)| s.f1_score).sum::<f64>() / k,
            support: total,
        };

        let weighted = |f: fn(&ClassScores) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes
                    .iter()
                    .map(|(_, s)| f(s) * s.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };
        let weighted_avg = ClassScores {
            precision: weighted(|s| s.precision),
            recall: weighted(|s| s.recall),
            f1_score: weighted(|s| s.f1_score),
            support: total,
        };

        ClassificationReport {
            accuracy: Self::accuracy(y_true, y_pred),
            classes,
            macro_avg,
            weighted_avg,
        }
    }

    fn class_scores(y_true: &Array1<f64>, y_pred: &Array1<f64>, class: f64) -> ClassScores {
        let (tp, fp, fn_) = Self::confusion_values(y_true, y_pred, class);

        let precision = if tp + fp == 0 { 0.0 } else { tp as f64 / (tp + fp) as f64 };
        let recall = if tp + fn_ == 0 { 0.0 } else { tp as f64 / (tp + fn_) as f64 };
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        ClassScores {
            precision,
            recall,
            f1_score,
            support: tp + fn_,
        }
    }

    /// Calculate confusion values (TP, FP, FN) for one class
    fn confusion_values(y_true: &Array1<f64>, y_pred: &Array1<f64>, class: f64) -> (usize, usize, usize) {
        let target = class_name(class);
        let mut tp = 0;
        let mut fp = 0;
        let mut fn_ = 0;

        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (class_name(t) == target, class_name(p) == target) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }

        (tp, fp, fn_)
    }

    // ==================== Regression Metrics ====================

    /// Mean Absolute Error
    pub fn mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        assert_eq!(y_true.len(), y_pred.len(), "Arrays must have same length");
        if y_true.is_empty() {
            return 0.0;
        }
        (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(0.0)
    }

    /// Mean Squared Error
    pub fn mse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        assert_eq!(y_true.len(), y_pred.len(), "Arrays must have same length");
        if y_true.is_empty() {
            return 0.0;
        }
        (y_true - y_pred).mapv(|e| e * e).mean().unwrap_or(0.0)
    }

    /// Root Mean Squared Error
    pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        Self::mse(y_true, y_pred).sqrt()
    }

    /// Coefficient of determination
    ///
    /// With a constant target, a perfect fit scores 1 and anything else 0.
    pub fn r2(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        assert_eq!(y_true.len(), y_pred.len(), "Arrays must have same length");
        if y_true.is_empty() {
            return 0.0;
        }

        let mean = y_true.mean().unwrap_or(0.0);
        let ss_res: f64 = (y_true - y_pred).mapv(|e| e * e).sum();
        let ss_tot: f64 = y_true.mapv(|v| (v - mean).powi(2)).sum();

        if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        }
    }
}
