//! HTTP tests for the upload form

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{readings_csv, test_config};
use sensor_anomaly::server::{router, AppState};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "sensor-anomaly-test-boundary";

fn app(output_dir: &Path) -> Router {
    router(Arc::new(AppState::new(test_config(output_dir))))
}

fn upload_request(field: &str, file_name: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n{content}\r\n--{b}--\r\n",
        b = BOUNDARY,
    );

    Request::builder()
        .method("POST")
        .uri("/api/process")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_index_serves_upload_form() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Upload your Excel file"));
    assert!(html.contains("/api/process"));
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_upload_returns_metrics_and_serves_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let response = app
        .clone()
        .oneshot(upload_request("file", "readings.csv", &readings_csv(50)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert!(json["accuracy"].as_f64().unwrap() <= 1.0);
    assert!(json["classification_report"]["accuracy"].is_number());
    assert!(json["classification_report"]["weighted avg"]["f1-score"].is_number());
    assert_eq!(json["regression"].as_array().unwrap().len(), 3);
    assert_eq!(json["anomalies_file"], "/files/anomalies_sorted.xlsx");
    assert_eq!(json["plot"], "/files/plot.png?run=1");
    assert_eq!(json["plot_title"], "Regression Analysis");
    assert_eq!(json["legend"][1], "Regression Line (a1)");

    let download = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/files/anomalies_sorted.xlsx")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);

    let plot = app
        .oneshot(Request::builder().uri("/files/plot.png").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(plot.status(), StatusCode::OK);
    assert_eq!(plot.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(upload_request("other", "readings.csv", &readings_csv(10)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "No file uploaded");
}

#[tokio::test]
async fn test_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(upload_request("file", "readings.txt", "a1,a2,a3\n1,2,3\n"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_missing_column_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(upload_request("file", "readings.csv", "a1,a2\n1,2\n3,4\n"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("a3"));
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.server.max_upload_bytes = 1024;
    let app = router(Arc::new(AppState::new(config)));

    let response = app
        .oneshot(upload_request("file", "readings.csv", &readings_csv(200)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["success"], false);
}
