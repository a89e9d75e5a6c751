//! End-to-end analysis of one uploaded table
//!
//! load → label → feature-engineer → split → fit → score → export → plot

use crate::anomaly::{label_rows, AnomalyRule, AnomalySummary};
use crate::config::AnalyzerConfig;
use crate::data::{write_csv, write_xlsx, SensorTable};
use crate::error::Result;
use crate::features::{FeatureEngine, MEAN_COLUMN};
use crate::metrics::{ClassificationReport, Metrics, RegressionMetrics};
use crate::models::{RandomForest, TaskType};
use crate::plot::{RegressionPlot, RegressionSeries};
use crate::CHANNELS;
use ndarray::Array1;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Regression result for one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelRegression {
    pub channel: String,
    /// Rows with a finite, non-zero reading
    pub n_samples: usize,
    #[serde(flatten)]
    pub metrics: RegressionMetrics,
}

/// Everything one pipeline run produces
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Classifier accuracy on the held-out rows
    pub accuracy: f64,
    pub classification_report: ClassificationReport,
    /// One entry per channel that had usable rows
    pub regression: Vec<ChannelRegression>,
    pub anomalies_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies_csv: Option<PathBuf>,
    pub plot_file: PathBuf,
    pub rule: AnomalyRule,
    pub summary: AnomalySummary,
    /// Rows with complete classifier inputs
    pub n_classified: usize,
    pub n_train: usize,
    pub n_test: usize,
    /// Classifier feature importances, most important first
    pub feature_importances: Vec<(String, f64)>,
}

/// Runs the analysis with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: AnalyzerConfig,
    features: FeatureEngine,
}

impl Pipeline {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            features: FeatureEngine::new(),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Load a table from disk and analyse it
    pub fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisReport> {
        let table = SensorTable::from_path(path)?;
        self.process(table)
    }

    /// Analyse an uploaded file held in memory
    pub fn process_upload(&self, file_name: &str, bytes: &[u8]) -> Result<AnalysisReport> {
        let table = SensorTable::from_bytes(file_name, bytes)?;
        self.process(table)
    }

    /// Analyse a loaded table, writing the anomaly export and the plot
    pub fn process(&self, mut table: SensorTable) -> Result<AnalysisReport> {
        let started = Instant::now();
        let rule = self.config.pipeline.rule;
        info!("Analysing {} rows with rule {}", table.n_rows(), rule.name());

        // Label and engineer features
        let labels = label_rows(&mut table, rule)?;
        let summary = AnomalySummary::from_labels(&labels);
        self.features.add_features(&mut table)?;
        info!(
            "Labelled {} of {} rows as anomalies ({:.1}%)",
            summary.anomaly_count,
            summary.total_rows,
            summary.anomaly_rate() * 100.0
        );

        // Classifier
        let dataset = self.features.classification_dataset(&table, &labels)?;
        let split = dataset.train_test_split(self.config.pipeline.test_ratio, self.config.pipeline.seed)?;

        let mut classifier_config = self.config.classifier.clone();
        classifier_config.task = TaskType::Classification;
        let mut classifier = RandomForest::new(classifier_config);
        classifier.fit(&split.train);

        let y_true = split.test.labels_array();
        let y_pred = Array1::from_vec(classifier.predict(&split.test));
        let accuracy = Metrics::accuracy(&y_true, &y_pred);
        let classification_report = Metrics::classification_report(&y_true, &y_pred);
        info!(
            "Classifier trained on {} rows, test accuracy {:.4} on {} rows",
            split.train.n_samples(),
            accuracy,
            split.test.n_samples()
        );

        // Export anomalies, highest mean first
        let mut anomalies = table.filter_rows(&labels);
        anomalies.sort_by_column(MEAN_COLUMN, true)?;
        let anomalies_file = self.config.output.anomalies_path();
        write_xlsx(&anomalies, &anomalies_file)?;
        let anomalies_csv = self.config.output.anomalies_csv_path();
        if let Some(path) = &anomalies_csv {
            write_csv(&anomalies, path)?;
        }

        // Per-channel regressors
        let mut regression = Vec::with_capacity(CHANNELS.len());
        let mut series = Vec::with_capacity(CHANNELS.len());
        for channel in CHANNELS {
            let data = self.features.channel_dataset(&table, channel)?;
            if data.is_empty() {
                warn!("Channel {} has no non-zero readings, skipping regression", channel);
                continue;
            }

            let mut regressor_config = self.config.regressor.clone();
            regressor_config.task = TaskType::Regression;
            let mut regressor = RandomForest::new(regressor_config);
            regressor.fit(&data);

            let predictions = regressor.predict(&data);
            let metrics = RegressionMetrics::compute(&data.labels_array(), &Array1::from_vec(predictions.clone()));
            info!(
                "Channel {}: MAE {:.4}, RMSE {:.4}, R² {:.4} over {} rows",
                channel,
                metrics.mae,
                metrics.rmse,
                metrics.r2,
                data.n_samples()
            );

            series.push(RegressionSeries::new(channel, &data.column(0), &data.labels, &predictions));
            regression.push(ChannelRegression {
                channel: channel.to_string(),
                n_samples: data.n_samples(),
                metrics,
            });
        }

        let plot_file = self.config.output.plot_path();
        RegressionPlot::with_size(self.config.output.plot_width, self.config.output.plot_height)
            .save(&series, &plot_file)?;

        info!("Analysis finished in {:.2}s", started.elapsed().as_secs_f64());

        Ok(AnalysisReport {
            accuracy,
            classification_report,
            regression,
            anomalies_file,
            anomalies_csv,
            plot_file,
            rule,
            summary,
            n_classified: dataset.n_samples(),
            n_train: split.train.n_samples(),
            n_test: split.test.n_samples(),
            feature_importances: classifier
                .feature_importance_ranking()
                .into_iter()
                .map(|(name, imp)| (name.to_string(), imp))
                .collect(),
        })
    }
}
