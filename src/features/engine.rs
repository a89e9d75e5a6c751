//! Feature engineering engine

use crate::data::{Cell, Dataset, SensorTable};
use crate::error::Result;
use crate::CHANNELS;
use tracing::{debug, warn};

pub const MEAN_COLUMN: &str = "mean_a";
pub const STD_COLUMN: &str = "std_a";

/// Mean of the finite values in a row (NaN when none are finite)
pub fn row_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Sample standard deviation (ddof = 1) of the finite values in a row
pub fn row_std(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return f64::NAN;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let variance =
        finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    variance.sqrt()
}

/// Builds derived columns and the classification dataset
#[derive(Debug, Clone, Default)]
pub struct FeatureEngine;

impl FeatureEngine {
    pub fn new() -> Self {
        Self
    }

    /// Classifier input names, in column order
    pub fn feature_names(&self) -> Vec<String> {
        CHANNELS
            .iter()
            .map(|c| c.to_string())
            .chain([MEAN_COLUMN.to_string(), STD_COLUMN.to_string()])
            .collect()
    }

    /// Compute `mean_a` and `std_a` for every row and write them to the table
    pub fn add_features(&self, table: &mut SensorTable) -> Result<()> {
        let readings = table.readings()?;
        let means: Vec<Cell> = readings.iter().map(|r| Cell::Number(row_mean(r))).collect();
        let stds: Vec<Cell> = readings.iter().map(|r| Cell::Number(row_std(r))).collect();

        table.set_column(MEAN_COLUMN, means);
        table.set_column(STD_COLUMN, stds);
        debug!("Added {} and {} for {} rows", MEAN_COLUMN, STD_COLUMN, table.n_rows());
        Ok(())
    }

    /// Build the classification dataset from a featured table
    ///
    /// Rows with any non-finite input are left out; the label is 1.0 for an
    /// anomaly and 0.0 otherwise.
    pub fn classification_dataset(&self, table: &SensorTable, labels: &[bool]) -> Result<Dataset> {
        let names = self.feature_names();
        let columns: Vec<Vec<f64>> = names
            .iter()
            .map(|name| table.channel(name))
            .collect::<Result<_>>()?;

        let mut dataset = Dataset::new(names);
        let mut skipped = 0;

        for (row, &label) in labels.iter().enumerate() {
            let features: Vec<f64> = columns.iter().map(|col| col[row]).collect();
            if features.iter().all(|v| v.is_finite()) {
                dataset.add_sample(features, if label { 1.0 } else { 0.0 }, row);
            } else {
                skipped += 1;
            }
        }

        if skipped > 0 {
            warn!("Excluded {} rows with missing readings from classification", skipped);
        }
        Ok(dataset)
    }

    /// Single-feature regression dataset for one channel
    ///
    /// Keeps rows where the channel is finite and non-zero; the channel is
    /// both the input and the target.
    pub fn channel_dataset(&self, table: &SensorTable, channel: &str) -> Result<Dataset> {
        let values = table.channel(channel)?;
        let mut dataset = Dataset::new(vec![channel.to_string()]);

        for (row, &v) in values.iter().enumerate() {
            if v.is_finite() && v != 0.0 {
                dataset.add_sample(vec![v], v, row);
            }
        }
        Ok(dataset)
    }
}
