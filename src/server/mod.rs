//! Upload form served over HTTP
//!
//! One page, one upload endpoint: each upload runs the pipeline once and
//! overwrites the two output files, which are then served for download.

mod error;
mod handlers;

pub use error::{ServerError, ServerResult};
pub use handlers::ProcessResponse;

use crate::config::AnalyzerConfig;
use crate::pipeline::Pipeline;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

/// Route prefix under which output files are served
pub const FILES_ROUTE: &str = "/files";

/// Shared server state
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Serialises pipeline runs; both output files are shared
    pub run_lock: Mutex<()>,
    /// Completed runs, used to bust cached plot images
    pub runs: AtomicU64,
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: AnalyzerConfig) -> Self {
        let output_dir = config.output.output_dir.clone();
        let max_upload_bytes = config.server.max_upload_bytes;
        Self {
            pipeline: Arc::new(Pipeline::new(config)),
            run_lock: Mutex::new(()),
            runs: AtomicU64::new(0),
            output_dir,
            max_upload_bytes,
        }
    }

    /// Download URL of an output file
    pub fn file_url(&self, file_name: &str) -> String {
        format!("{}/{}", FILES_ROUTE, file_name)
    }
}

pub type SharedState = Arc<AppState>;

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/process", post(handlers::process_upload))
        .nest_service(FILES_ROUTE, ServeDir::new(&state.output_dir))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl+C
pub async fn serve(config: AnalyzerConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.output.output_dir)?;
    let addr = config.server.bind_addr();
    let state = Arc::new(AppState::new(config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Upload form running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
