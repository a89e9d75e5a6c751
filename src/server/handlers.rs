//! Request handlers

use super::error::{ServerError, ServerResult};
use super::SharedState;
use crate::anomaly::AnomalySummary;
use crate::metrics::ClassificationReport;
use crate::pipeline::{AnalysisReport, ChannelRegression};
use crate::plot;
use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::Json;
use serde::Serialize;
use std::sync::atomic::Ordering;
use tracing::info;

const INDEX_HTML: &str = include_str!("index.html");

/// Upload form
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Response to a processed upload
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub accuracy: f64,
    pub classification_report: ClassificationReport,
    pub regression: Vec<ChannelRegression>,
    /// Download URL of the sorted anomalies workbook
    pub anomalies_file: String,
    /// URL of the regression plot
    pub plot: String,
    pub plot_title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub legend: Vec<String>,
    pub summary: AnomalySummary,
    pub n_train: usize,
    pub n_test: usize,
    pub feature_importances: Vec<(String, f64)>,
}

impl ProcessResponse {
    fn from_report(report: AnalysisReport, state: &SharedState, run: u64) -> Self {
        let file_name = |path: &std::path::Path| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let legend = report
            .regression
            .iter()
            .flat_map(|r| plot::legend_entries(&r.channel))
            .collect();

        Self {
            success: true,
            accuracy: report.accuracy,
            classification_report: report.classification_report,
            regression: report.regression,
            anomalies_file: state.file_url(&file_name(report.anomalies_file.as_path())),
            plot: format!("{}?run={}", state.file_url(&file_name(report.plot_file.as_path())), run),
            plot_title: plot::TITLE,
            x_label: plot::X_LABEL,
            y_label: plot::Y_LABEL,
            legend,
            summary: report.summary,
            n_train: report.n_train,
            n_test: report.n_test,
            feature_importances: report.feature_importances,
        }
    }
}

/// Run the pipeline on the uploaded `file` field
pub async fn process_upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> ServerResult<Json<ProcessResponse>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
        let data = field.bytes().await?;
        info!("Received file: {} ({} bytes)", file_name, data.len());

        let _guard = state.run_lock.lock().await;
        let pipeline = state.pipeline.clone();
        let report = tokio::task::spawn_blocking(move || pipeline.process_upload(&file_name, &data))
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??;

        let run = state.runs.fetch_add(1, Ordering::SeqCst) + 1;
        return Ok(Json(ProcessResponse::from_report(report, &state, run)));
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}
