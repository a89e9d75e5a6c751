//! Data structures and spreadsheet I/O module
//!
//! Provides the uploaded sensor table, the anomaly export and ML datasets.

mod dataset;
mod export;
mod table;

pub use dataset::{bootstrap_indices, Dataset, Split};
pub use export::{write_csv, write_xlsx};
pub use table::{load_table, load_table_bytes, Cell, SensorTable, TableFormat};
