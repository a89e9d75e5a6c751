//! Dataset structure for machine learning

use crate::error::{AnalyzerError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Dataset for machine learning with features and labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Feature matrix (n_samples x n_features)
    pub features: Vec<Vec<f64>>,
    /// Target labels
    pub labels: Vec<f64>,
    /// Feature names
    pub feature_names: Vec<String>,
    /// Source table row of each sample
    pub row_ids: Vec<usize>,
}

/// Train/test split result
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

impl Dataset {
    /// Create a new empty dataset
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            features: Vec::new(),
            labels: Vec::new(),
            feature_names,
            row_ids: Vec::new(),
        }
    }

    /// Number of samples
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    /// Number of features
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Add a sample
    pub fn add_sample(&mut self, features: Vec<f64>, label: f64, row_id: usize) {
        assert_eq!(features.len(), self.feature_names.len());
        self.features.push(features);
        self.labels.push(label);
        self.row_ids.push(row_id);
    }

    /// Get labels as ndarray
    pub fn labels_array(&self) -> Array1<f64> {
        Array1::from_vec(self.labels.clone())
    }

    /// Values of one feature column
    pub fn column(&self, feature_idx: usize) -> Vec<f64> {
        self.features.iter().map(|row| row[feature_idx]).collect()
    }

    /// Shuffled split into train and test sets
    ///
    /// The test side takes `ceil(test_ratio * n)` samples from the front of
    /// a seeded permutation and the train side takes the rest.
    pub fn train_test_split(&self, test_ratio: f64, seed: u64) -> Result<Split> {
        let n = self.n_samples();
        let test_size = (test_ratio * n as f64).ceil() as usize;

        if n < 2 || test_size == 0 || test_size >= n {
            return Err(AnalyzerError::InsufficientData {
                available: n,
                required: 2,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);

        let (test_indices, train_indices) = indices.split_at(test_size);

        Ok(Split {
            train: self.subset(train_indices),
            test: self.subset(test_indices),
        })
    }

    /// Create a subset of the dataset by indices
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            feature_names: self.feature_names.clone(),
            row_ids: indices.iter().map(|&i| self.row_ids[i]).collect(),
        }
    }

    /// Bootstrap sample (random sample with replacement)
    pub fn bootstrap_sample(&self, seed: u64) -> Dataset {
        self.subset(&bootstrap_indices(self.n_samples(), seed))
    }
}

/// Indices drawn with replacement from `0..n`
pub fn bootstrap_indices(n: usize, seed: u64) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset(n: usize) -> Dataset {
        let mut dataset = Dataset::new(vec!["f1".to_string(), "f2".to_string()]);
        for i in 0..n {
            dataset.add_sample(vec![i as f64, (i * 2) as f64], (i % 2) as f64, i);
        }
        dataset
    }

    #[test]
    fn test_dataset_operations() {
        let dataset = sample_dataset(3);
        assert_eq!(dataset.n_samples(), 3);
        assert_eq!(dataset.n_features(), 2);
        assert_eq!(dataset.column(1), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_split_sizes_round_test_up() {
        let dataset = sample_dataset(10);
        let split = dataset.train_test_split(0.3, 42).unwrap();
        assert_eq!(split.test.n_samples(), 3);
        assert_eq!(split.train.n_samples(), 7);

        let dataset = sample_dataset(11);
        let split = dataset.train_test_split(0.3, 42).unwrap();
        assert_eq!(split.test.n_samples(), 4);
        assert_eq!(split.train.n_samples(), 7);
    }

    #[test]
    fn test_split_is_partition_and_deterministic() {
        let dataset = sample_dataset(20);
        let a = dataset.train_test_split(0.3, 7).unwrap();
        let b = dataset.train_test_split(0.3, 7).unwrap();
        assert_eq!(a.test.row_ids, b.test.row_ids);

        let mut all: Vec<usize> = a.train.row_ids.iter().chain(a.test.row_ids.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_too_small() {
        let dataset = sample_dataset(1);
        assert!(matches!(
            dataset.train_test_split(0.3, 42),
            Err(AnalyzerError::InsufficientData { available: 1, .. })
        ));
    }

    #[test]
    fn test_bootstrap_sample_size() {
        let dataset = sample_dataset(15);
        let boot = dataset.bootstrap_sample(3);
        assert_eq!(boot.n_samples(), 15);
        assert!(boot.row_ids.iter().all(|&i| i < 15));
    }
}
