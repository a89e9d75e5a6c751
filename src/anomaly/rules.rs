//! Zero-channel anomaly rule

use crate::data::{Cell, SensorTable};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Name of the label column added to the table
pub const ANOMALY_COLUMN: &str = "Anomaly";

/// Rule deciding whether a row of readings is anomalous
///
/// Comparisons involving NaN are false, so a missing reading is never
/// treated as zero or as positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyRule {
    /// Exactly one channel reads zero while another channel is positive
    #[default]
    ExactlyOneZero,
    /// Any channel reads zero while another channel is positive
    AnyZero,
}

impl AnomalyRule {
    /// Evaluate the rule for one row
    pub fn is_anomaly(&self, readings: &[f64; 3]) -> bool {
        let zero_at = |i: usize| readings[i] == 0.0;
        let others_positive =
            |i: usize| (0..3).filter(|&j| j != i).any(|j| readings[j] > 0.0);

        match self {
            AnomalyRule::AnyZero => (0..3).any(|i| zero_at(i) && others_positive(i)),
            AnomalyRule::ExactlyOneZero => {
                let zeros: Vec<usize> = (0..3).filter(|&i| zero_at(i)).collect();
                zeros.len() == 1 && others_positive(zeros[0])
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnomalyRule::ExactlyOneZero => "exactly_one_zero",
            AnomalyRule::AnyZero => "any_zero",
        }
    }
}

/// Summary of a labelling pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalySummary {
    pub total_rows: usize,
    pub anomaly_count: usize,
}

impl AnomalySummary {
    pub fn from_labels(labels: &[bool]) -> Self {
        Self {
            total_rows: labels.len(),
            anomaly_count: labels.iter().filter(|&&a| a).count(),
        }
    }

    /// Fraction of rows labelled anomalous
    pub fn anomaly_rate(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.anomaly_count as f64 / self.total_rows as f64
        }
    }
}

/// Label every row of the table and write the `Anomaly` column
pub fn label_rows(table: &mut SensorTable, rule: AnomalyRule) -> Result<Vec<bool>> {
    let labels: Vec<bool> = table
        .readings()?
        .iter()
        .map(|r| rule.is_anomaly(r))
        .collect();

    table.set_column(ANOMALY_COLUMN, labels.iter().map(|&a| Cell::Bool(a)).collect());
    Ok(labels)
}
