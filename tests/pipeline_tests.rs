//! End-to-end pipeline tests

mod common;

use common::{readings_csv, test_config};
use sensor_anomaly::anomaly::AnomalyRule;
use sensor_anomaly::data::{write_xlsx, Cell, SensorTable};
use sensor_anomaly::error::AnalyzerError;
use sensor_anomaly::pipeline::Pipeline;
use tempfile::tempdir;

#[test]
fn test_csv_upload_produces_all_outputs() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path()));

    let report = pipeline
        .process_upload("readings.csv", readings_csv(80).as_bytes())
        .unwrap();

    // rows 0, 4, 8, ... have a1 == 0; rows 7, 21, 35, ... have a3 == 0 alone
    let expected = (0..80)
        .filter(|i| (i % 4 == 0) != (i % 7 == 0))
        .count();
    assert_eq!(report.summary.total_rows, 80);
    assert_eq!(report.summary.anomaly_count, expected);

    assert_eq!(report.n_classified, 80);
    assert_eq!(report.n_test, 24);
    assert_eq!(report.n_train, 56);
    assert!(report.accuracy >= 0.0 && report.accuracy <= 1.0);
    assert_eq!(report.classification_report.accuracy, report.accuracy);
    assert_eq!(report.feature_importances.len(), 5);

    assert_eq!(report.regression.len(), 3);
    for r in &report.regression {
        assert!(r.metrics.mae >= 0.0);
        assert!(r.metrics.rmse >= r.metrics.mae);
    }
    assert_eq!(report.regression[0].n_samples, 60);

    assert!(report.plot_file.exists());
    assert_eq!(report.anomalies_file, dir.path().join("anomalies_sorted.xlsx"));
}

#[test]
fn test_anomaly_export_is_sorted_with_all_columns() {
    let dir = tempdir().unwrap();
    let report = Pipeline::new(test_config(dir.path()))
        .process_upload("readings.csv", readings_csv(60).as_bytes())
        .unwrap();

    let exported = SensorTable::from_path(&report.anomalies_file).unwrap();
    assert_eq!(
        exported.headers(),
        &["timestamp", "a1", "a2", "a3", "site", "Anomaly", "mean_a", "std_a"]
    );
    assert_eq!(exported.n_rows(), report.summary.anomaly_count);

    let anomaly_idx = exported.column_index("Anomaly").unwrap();
    assert!(exported
        .rows()
        .iter()
        .all(|row| row[anomaly_idx] == Cell::Bool(true)));

    let means = exported.channel("mean_a").unwrap();
    assert!(means.windows(2).all(|w| w[0] >= w[1]));

    let site_idx = exported.column_index("site").unwrap();
    assert!(matches!(exported.rows()[0][site_idx], Cell::Text(ref s) if s.starts_with("plant-")));
}

#[test]
fn test_outputs_are_overwritten() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path()));

    let first = pipeline
        .process_upload("readings.csv", readings_csv(60).as_bytes())
        .unwrap();
    let second = pipeline
        .process_upload("readings.csv", readings_csv(30).as_bytes())
        .unwrap();

    assert_eq!(first.anomalies_file, second.anomalies_file);
    let exported = SensorTable::from_path(&second.anomalies_file).unwrap();
    assert_eq!(exported.n_rows(), second.summary.anomaly_count);
}

#[test]
fn test_any_zero_rule_flags_double_zero_rows() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());

    let mut csv = readings_csv(40);
    csv.push_str("2000,0,0,5,plant-0\n");

    let strict = Pipeline::new(config.clone())
        .process_upload("readings.csv", csv.as_bytes())
        .unwrap();

    config.pipeline.rule = AnomalyRule::AnyZero;
    let loose = Pipeline::new(config)
        .process_upload("readings.csv", csv.as_bytes())
        .unwrap();

    // rows 0 and 28 have a1 == a3 == 0, plus the appended row
    assert_eq!(loose.summary.anomaly_count, strict.summary.anomaly_count + 3);
    assert_eq!(loose.rule, AnomalyRule::AnyZero);
}

#[test]
fn test_xlsx_input() {
    let dir = tempdir().unwrap();
    let table = SensorTable::from_bytes("readings.csv", readings_csv(40).as_bytes()).unwrap();
    let input = dir.path().join("input").join("readings.xlsx");
    write_xlsx(&table, &input).unwrap();

    let report = Pipeline::new(test_config(&dir.path().join("out")))
        .process_file(&input)
        .unwrap();

    assert_eq!(report.summary.total_rows, 40);
    assert!(report.anomalies_file.exists());
}

#[test]
fn test_channel_without_readings_is_skipped() {
    let dir = tempdir().unwrap();
    let mut csv = String::from("a1,a2,a3\n");
    for i in 0..30 {
        csv.push_str(&format!("{},{},0\n", 1 + i % 5, 2 + i % 3));
    }

    let report = Pipeline::new(test_config(dir.path()))
        .process_upload("flat.csv", csv.as_bytes())
        .unwrap();

    let channels: Vec<&str> = report.regression.iter().map(|r| r.channel.as_str()).collect();
    assert_eq!(channels, vec!["a1", "a2"]);
    assert_eq!(report.summary.anomaly_count, 30);
    assert!(report.plot_file.exists());
}

#[test]
fn test_rows_with_missing_readings_are_not_classified() {
    let dir = tempdir().unwrap();
    let mut csv = readings_csv(30);
    csv.push_str("3000,,4,0,plant-1\n");

    let report = Pipeline::new(test_config(dir.path()))
        .process_upload("readings.csv", csv.as_bytes())
        .unwrap();

    assert_eq!(report.summary.total_rows, 31);
    assert_eq!(report.n_classified, 30);
}

#[test]
fn test_too_few_rows() {
    let dir = tempdir().unwrap();
    let err = Pipeline::new(test_config(dir.path()))
        .process_upload("one.csv", b"a1,a2,a3\n0,1,2\n")
        .unwrap_err();

    assert!(matches!(err, AnalyzerError::InsufficientData { available: 1, .. }));
    assert!(err.is_input_error());
}

#[test]
fn test_missing_channel_column() {
    let dir = tempdir().unwrap();
    let err = Pipeline::new(test_config(dir.path()))
        .process_upload("bad.csv", b"a1,a2,b3\n0,1,2\n")
        .unwrap_err();

    assert!(matches!(err, AnalyzerError::MissingColumn(ref c) if c == "a3"));
}

#[test]
fn test_optional_csv_copy_of_anomalies() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.output.anomalies_csv = Some("anomalies_sorted.csv".to_string());

    let report = Pipeline::new(config)
        .process_upload("readings.csv", readings_csv(40).as_bytes())
        .unwrap();

    let csv_path = report.anomalies_csv.clone().unwrap();
    assert_eq!(csv_path, dir.path().join("anomalies_sorted.csv"));

    let from_csv = SensorTable::from_path(&csv_path).unwrap();
    let from_xlsx = SensorTable::from_path(&report.anomalies_file).unwrap();
    assert_eq!(from_csv.headers(), from_xlsx.headers());
    assert_eq!(from_csv.n_rows(), report.summary.anomaly_count);
    assert_eq!(from_csv.channel("mean_a").unwrap(), from_xlsx.channel("mean_a").unwrap());

    let without = Pipeline::new(test_config(dir.path()))
        .process_upload("readings.csv", readings_csv(40).as_bytes())
        .unwrap();
    assert!(without.anomalies_csv.is_none());
}

#[test]
fn test_channel_regression_does_not_depend_on_scale() {
    let ramp = |scale: f64| {
        let mut csv = String::from("a1,a2,a3\n");
        for i in 1..=100 {
            let v = i as f64 * scale;
            csv.push_str(&format!("{:e},{:e},{:e}\n", v, v * 2.0, v * 3.0));
        }
        csv
    };

    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path()));
    let unit = pipeline.process_upload("unit.csv", ramp(1.0).as_bytes()).unwrap();
    let micro = pipeline.process_upload("micro.csv", ramp(1e-6).as_bytes()).unwrap();

    for (u, m) in unit.regression.iter().zip(&micro.regression) {
        assert_eq!(u.channel, m.channel);
        assert!(m.metrics.r2 > 0.99, "{} R² {}", m.channel, m.metrics.r2);
        assert!((u.metrics.r2 - m.metrics.r2).abs() < 1e-3);
    }
}
