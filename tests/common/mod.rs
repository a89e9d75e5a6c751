//! Shared fixtures for integration tests

use sensor_anomaly::config::AnalyzerConfig;
use std::path::Path;

/// Deterministic readings: every fourth row has `a1 == 0`, every seventh
/// has `a3 == 0`, the rest are positive.
pub fn readings_csv(n: usize) -> String {
    let mut csv = String::from("timestamp,a1,a2,a3,site\n");
    for i in 0..n {
        let base = 10.0 + (i % 13) as f64 * 0.75;
        let a1 = if i % 4 == 0 { 0.0 } else { base + 0.5 };
        let a2 = base * 1.1;
        let a3 = if i % 7 == 0 { 0.0 } else { base * 0.9 + (i % 3) as f64 };
        csv.push_str(&format!("{},{},{},{},plant-{}\n", 1000 + i, a1, a2, a3, i % 2));
    }
    csv
}

/// Small, fast configuration writing into `output_dir`
pub fn test_config(output_dir: &Path) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    config.output.output_dir = output_dir.to_path_buf();
    config.output.plot_width = 320;
    config.output.plot_height = 240;
    config.classifier.n_trees = 10;
    config.regressor.n_trees = 10;
    config
}
