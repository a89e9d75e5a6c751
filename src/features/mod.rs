//! Feature engineering module
//!
//! Provides row statistics and the classifier input matrix.

mod engine;

pub use engine::{row_mean, row_std, FeatureEngine, MEAN_COLUMN, STD_COLUMN};
