//! Configuration management
//!
//! All sections default to the behaviour of the original upload form, so an
//! absent or partial config file is always valid.

use crate::anomaly::AnomalyRule;
use crate::error::AnalyzerError;
use crate::models::{ForestConfig, TaskType};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of classifiable rows held out for scoring
    pub test_ratio: f64,
    /// Seed for the train/test shuffle
    pub seed: u64,
    /// Labelling rule
    pub rule: AnomalyRule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.3,
            seed: 42,
            rule: AnomalyRule::default(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub anomalies_file: String,
    /// Optional CSV copy of the anomaly export, written next to the workbook
    pub anomalies_csv: Option<String>,
    pub plot_file: String,
    pub plot_width: u32,
    pub plot_height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            anomalies_file: "anomalies_sorted.xlsx".to_string(),
            anomalies_csv: None,
            plot_file: "plot.png".to_string(),
            plot_width: 800,
            plot_height: 600,
        }
    }
}

impl OutputConfig {
    pub fn anomalies_path(&self) -> PathBuf {
        self.output_dir.join(&self.anomalies_file)
    }

    pub fn anomalies_csv_path(&self) -> Option<PathBuf> {
        self.anomalies_csv.as_ref().map(|name| self.output_dir.join(name))
    }

    pub fn plot_path(&self) -> PathBuf {
        self.output_dir.join(&self.plot_file)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub fn directive(&self) -> String {
        format!("sensor_anomaly={}", self.level)
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub pipeline: PipelineConfig,
    pub classifier: ForestConfig,
    pub regressor: ForestConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            classifier: ForestConfig::classification(),
            regressor: ForestConfig::regression(),
            output: OutputConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let mut config: AnalyzerConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse config: {:?}", path))?;
        config.classifier.task = TaskType::Classification;
        config.regressor.task = TaskType::Regression;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> std::result::Result<(), AnalyzerError> {
        let ratio = self.pipeline.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(AnalyzerError::Config(format!(
                "pipeline.test_ratio must be in (0, 1), got {}",
                ratio
            )));
        }
        for (name, forest) in [("classifier", &self.classifier), ("regressor", &self.regressor)] {
            if forest.n_trees == 0 {
                return Err(AnalyzerError::Config(format!("{}.n_trees must be positive", name)));
            }
            if forest.min_samples_split < 2 {
                return Err(AnalyzerError::Config(format!(
                    "{}.min_samples_split must be at least 2",
                    name
                )));
            }
            if forest.min_samples_leaf == 0 {
                return Err(AnalyzerError::Config(format!(
                    "{}.min_samples_leaf must be positive",
                    name
                )));
            }
        }
        if self.output.plot_width < 200 || self.output.plot_height < 150 {
            return Err(AnalyzerError::Config(
                "output plot must be at least 200x150 pixels".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.pipeline.seed, 42);
        assert_eq!(config.classifier.n_trees, 100);
        assert_eq!(config.classifier.task, TaskType::Classification);
        assert_eq!(config.regressor.task, TaskType::Regression);
        assert_eq!(config.output.anomalies_path(), PathBuf::from("output/anomalies_sorted.xlsx"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AnalyzerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AnalyzerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.pipeline.rule, config.pipeline.rule);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nrule = \"any_zero\"\n\n[classifier]\nn_trees = 10").unwrap();

        let config = AnalyzerConfig::load(file.path()).unwrap();
        assert_eq!(config.pipeline.rule, AnomalyRule::AnyZero);
        assert_eq!(config.pipeline.test_ratio, 0.3);
        assert_eq!(config.classifier.n_trees, 10);
        assert_eq!(config.classifier.task, TaskType::Classification);
        assert_eq!(config.regressor.n_trees, 100);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzer.toml");

        let mut config = AnalyzerConfig::default();
        config.pipeline.rule = AnomalyRule::AnyZero;
        config.output.anomalies_csv = Some("anomalies.csv".to_string());
        config.server.port = 8080;
        config.save(&path).unwrap();

        let loaded = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(loaded.pipeline.rule, AnomalyRule::AnyZero);
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(
            loaded.output.anomalies_csv_path(),
            Some(PathBuf::from("output/anomalies.csv"))
        );
        assert_eq!(loaded.classifier.max_depth, None);
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();

        let missing = AnalyzerConfig::load_or_default(dir.path().join("absent.toml"));
        assert_eq!(missing.server.port, 7860);
        assert_eq!(missing.output.anomalies_csv_path(), None);

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[pipeline]\ntest_ratio = 2.0\n").unwrap();
        assert_eq!(AnalyzerConfig::load_or_default(&broken).pipeline.test_ratio, 0.3);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let mut config = AnalyzerConfig::default();
        config.pipeline.test_ratio = 1.0;
        assert!(config.validate().is_err());
    }
}
