//! Run the analysis once on a spreadsheet
//!
//! Usage: cargo run --bin analyze_file -- readings.xlsx --output-dir output

use anyhow::{Context, Result};
use clap::Parser;
use sensor_anomaly::anomaly::AnomalyRule;
use sensor_anomaly::config::AnalyzerConfig;
use sensor_anomaly::pipeline::Pipeline;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Label, model and plot a channel spreadsheet")]
struct Args {
    /// Input file (.xlsx, .xls, .ods or .csv)
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the anomaly export and plot
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Use the looser rule that also flags rows with two zero channels
    #[arg(long)]
    any_zero: bool,

    /// Number of trees per forest
    #[arg(short, long)]
    trees: Option<usize>,

    /// Also write the anomalies as anomalies_sorted.csv
    #[arg(long)]
    csv: bool,

    /// Write the effective configuration to this TOML file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::load(path)?,
        None => AnalyzerConfig::default(),
    };
    if let Some(dir) = args.output_dir {
        config.output.output_dir = dir;
    }
    if args.any_zero {
        config.pipeline.rule = AnomalyRule::AnyZero;
    }
    if let Some(trees) = args.trees {
        config.classifier.n_trees = trees;
        config.regressor.n_trees = trees;
    }
    if args.csv {
        config.output.anomalies_csv = Some("anomalies_sorted.csv".to_string());
    }
    config.validate()?;

    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("Failed to save config to {:?}", path))?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.directive().into()),
        )
        .init();

    info!("Analysing {:?}", args.input);
    let report = Pipeline::new(config)
        .process_file(&args.input)
        .with_context(|| format!("Failed to analyse {:?}", args.input))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("===========================================");
    println!("  Channel Anomaly Analysis");
    println!("===========================================\n");

    println!(
        "Rows: {}  Anomalies: {} ({:.1}%)  Rule: {}",
        report.summary.total_rows,
        report.summary.anomaly_count,
        report.summary.anomaly_rate() * 100.0,
        report.rule.name()
    );
    println!("Train set: {} rows, test set: {} rows\n", report.n_train, report.n_test);

    println!("=== Classifier ===\n");
    println!("Accuracy: {:.4}\n", report.accuracy);
    println!("{:>14} {:>10} {:>10} {:>10} {:>8}", "", "precision", "recall", "f1-score", "support");
    for (name, s) in &report.classification_report.classes {
        println!(
            "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>8}",
            name, s.precision, s.recall, s.f1_score, s.support
        );
    }
    for (name, s) in [
        ("macro avg", &report.classification_report.macro_avg),
        ("weighted avg", &report.classification_report.weighted_avg),
    ] {
        println!(
            "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>8}",
            name, s.precision, s.recall, s.f1_score, s.support
        );
    }

    println!("\n=== Feature Importance Ranking ===\n");
    for (i, (name, imp)) in report.feature_importances.iter().enumerate() {
        let bar = "█".repeat((imp * 40.0) as usize);
        println!("{:2}. {:8} {:.4} {}", i + 1, name, imp, bar);
    }

    println!("\n=== Channel Regression ===\n");
    for r in &report.regression {
        println!(
            "{}: MAE {:.4}  RMSE {:.4}  R² {:.4}  ({} rows)",
            r.channel, r.metrics.mae, r.metrics.rmse, r.metrics.r2, r.n_samples
        );
    }

    println!("\nAnomalies written to {:?}", report.anomalies_file);
    if let Some(path) = &report.anomalies_csv {
        println!("CSV copy written to {:?}", path);
    }
    println!("Plot written to {:?}", report.plot_file);

    Ok(())
}
