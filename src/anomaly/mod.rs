//! Anomaly labelling module
//!
//! Rows are labelled by a fixed rule over the three channel readings; the
//! label is the target the classifier learns to reproduce.

mod rules;

pub use rules::{label_rows, AnomalyRule, AnomalySummary, ANOMALY_COLUMN};
