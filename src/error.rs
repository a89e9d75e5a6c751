//! Error types for the analysis pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, analysing or exporting a table
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file format: {0} (expected .xlsx, .xlsm, .xls, .ods or .csv)")]
    UnsupportedFormat(String),

    #[error("Failed to read workbook: {0}")]
    Workbook(String),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook {0} contains no worksheet")]
    EmptyWorkbook(String),

    #[error("Required column '{0}' not found")]
    MissingColumn(String),

    #[error("Not enough rows to split: {available} usable, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("Failed to write spreadsheet: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("Failed to render plot: {0}")]
    Plot(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AnalyzerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was caused by the uploaded content rather than the host
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Workbook(_)
                | Self::Csv(_)
                | Self::EmptyWorkbook(_)
                | Self::MissingColumn(_)
                | Self::InsufficientData { .. }
        )
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;
