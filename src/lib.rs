//! # Sensor Anomaly - Channel Anomaly Labelling and Random Forest Modelling
//!
//! This library analyses spreadsheets of three current channels (`a1`, `a2`,
//! `a3`): rows are labelled by a fixed zero-channel rule, two row statistics
//! are derived, a Random Forest classifier learns to reproduce the label and
//! one Random Forest regressor is fit per channel.
//!
//! ## Modules
//!
//! - `data` - Spreadsheet loading, the anomaly export and ML datasets
//! - `anomaly` - Rule-based anomaly labelling
//! - `features` - Row statistics used as classifier inputs
//! - `models` - Decision Tree and Random Forest implementations
//! - `metrics` - Classification report and regression scores
//! - `plot` - Regression chart rendering
//! - `pipeline` - The end-to-end upload pipeline
//! - `server` - Upload form served over HTTP

pub mod anomaly;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod plot;
pub mod server;

pub use anomaly::AnomalyRule;
pub use config::AnalyzerConfig;
pub use data::{Dataset, SensorTable};
pub use error::{AnalyzerError, Result};
pub use features::FeatureEngine;
pub use models::{DecisionTree, RandomForest};
pub use pipeline::{AnalysisReport, Pipeline};

/// Channel column names every input table must carry
pub const CHANNELS: [&str; 3] = ["a1", "a2", "a3"];

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::anomaly::{label_rows, AnomalyRule, AnomalySummary};
    pub use crate::config::AnalyzerConfig;
    pub use crate::data::{Cell, Dataset, SensorTable, Split};
    pub use crate::features::FeatureEngine;
    pub use crate::metrics::{ClassificationReport, RegressionMetrics};
    pub use crate::models::{DecisionTree, ForestConfig, RandomForest, TaskType, TreeConfig};
    pub use crate::pipeline::{AnalysisReport, Pipeline};
}
