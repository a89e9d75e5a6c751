//! Random Forest implementation

use super::decision_tree::{DecisionTree, TaskType, TreeConfig};
use crate::data::{bootstrap_indices, Dataset};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Random Forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree (None = unlimited)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Max features per split (sqrt of total for classification, all for
    /// regression, if None)
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
    /// Task type
    pub task: TaskType,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
            task: TaskType::Regression,
        }
    }
}

impl ForestConfig {
    pub fn classification() -> Self {
        Self {
            task: TaskType::Classification,
            ..Default::default()
        }
    }

    pub fn regression() -> Self {
        Self::default()
    }

    /// Features considered per split for a dataset of `n_features` columns
    pub fn resolve_max_features(&self, n_features: usize) -> usize {
        let resolved = self.max_features.unwrap_or_else(|| match self.task {
            TaskType::Classification => (n_features as f64).sqrt().floor() as usize,
            TaskType::Regression => n_features,
        });
        resolved.clamp(1, n_features.max(1))
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Create a new random forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            feature_names: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    /// Create with default regression config
    pub fn default_regression() -> Self {
        Self::new(ForestConfig::regression())
    }

    /// Create with default classification config
    pub fn default_classification() -> Self {
        Self::new(ForestConfig::classification())
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Train the random forest
    ///
    /// Each tree draws its bootstrap and split seeds from one generator
    /// seeded with `config.seed`, so a fit is reproducible regardless of
    /// how the trees are scheduled across threads.
    pub fn fit(&mut self, dataset: &Dataset) {
        self.feature_names = dataset.feature_names.clone();
        let n_features = dataset.n_features();
        let n_samples = dataset.n_samples();
        let max_features = self.config.resolve_max_features(n_features);

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let seeds: Vec<(u64, u64)> = (0..self.config.n_trees)
            .map(|_| (rng.gen(), rng.gen()))
            .collect();

        let config = &self.config;
        self.trees = seeds
            .into_par_iter()
            .map(|(sample_seed, tree_seed)| {
                let mut tree = DecisionTree::new(TreeConfig {
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split,
                    min_samples_leaf: config.min_samples_leaf,
                    max_features: Some(max_features),
                    seed: tree_seed,
                    task: config.task,
                });

                if config.bootstrap {
                    let sample = dataset.subset(&bootstrap_indices(n_samples, sample_seed));
                    tree.fit(&sample);
                } else {
                    tree.fit(dataset);
                }
                tree
            })
            .collect();

        // Aggregate feature importances
        self.feature_importances = vec![0.0; n_features];
        for tree in &self.trees {
            for (i, &imp) in tree.feature_importances().iter().enumerate() {
                self.feature_importances[i] += imp;
            }
        }

        let sum: f64 = self.feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= sum;
            }
        }
    }

    /// Predict for a single sample
    ///
    /// Regression averages the trees; classification averages the tree
    /// class probabilities and picks the more likely class (class 0 on ties).
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }

        match self.config.task {
            TaskType::Regression => {
                self.trees.iter().map(|t| t.predict_one(features)).sum::<f64>()
                    / self.trees.len() as f64
            }
            TaskType::Classification => {
                let [p0, p1] = self.predict_proba_one(features);
                if p1 > p0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Predict `[P(0), P(1)]` (for classification)
    pub fn predict_proba_one(&self, features: &[f64]) -> [f64; 2] {
        if self.trees.is_empty() {
            return [0.5, 0.5];
        }

        let n = self.trees.len() as f64;
        let [p0, p1] = self
            .trees
            .iter()
            .map(|t| t.predict_proba_one(features))
            .fold([0.0, 0.0], |acc, p| [acc[0] + p[0], acc[1] + p[1]]);

        [p0 / n, p1 / n]
    }

    /// Predict for multiple samples
    pub fn predict(&self, dataset: &Dataset) -> Vec<f64> {
        dataset
            .features
            .par_iter()
            .map(|f| self.predict_one(f))
            .collect()
    }

    /// Predict probabilities
    pub fn predict_proba(&self, dataset: &Dataset) -> Vec<[f64; 2]> {
        dataset
            .features
            .par_iter()
            .map(|f| self.predict_proba_one(f))
            .collect()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Get feature names with importances, sorted by importance
    pub fn feature_importance_ranking(&self) -> Vec<(&str, f64)> {
        let mut ranking: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .zip(self.feature_importances.iter())
            .map(|(n, &i)| (n.as_str(), i))
            .collect();

        ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranking
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_forest_regression() {
        let mut dataset = Dataset::new(vec!["x1".to_string(), "x2".to_string()]);

        for i in 0..200 {
            let x1 = (i as f64) / 20.0;
            let x2 = ((i as f64) / 10.0).sin();
            let y = x1 + x2 * 2.0 + 0.1 * (i as f64 % 5.0);
            dataset.add_sample(vec![x1, x2], y, i);
        }

        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 10,
            max_depth: Some(5),
            ..Default::default()
        });
        forest.fit(&dataset);

        assert_eq!(forest.n_trees(), 10);
        assert_eq!(forest.feature_importances().len(), 2);

        let total: f64 = forest.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_random_forest_classification() {
        let mut dataset = Dataset::new(vec!["x".to_string()]);

        for i in 0..200 {
            let x = i as f64 / 20.0;
            let y = if x > 5.0 { 1.0 } else { 0.0 };
            dataset.add_sample(vec![x], y, i);
        }

        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 20,
            ..ForestConfig::classification()
        });
        forest.fit(&dataset);

        let predictions = forest.predict(&dataset);
        let correct = predictions
            .iter()
            .zip(&dataset.labels)
            .filter(|(p, l)| p == l)
            .count();
        assert!(correct as f64 / 200.0 > 0.95);

        let [p0, p1] = forest.predict_proba_one(&[9.0]);
        assert!((p0 + p1 - 1.0).abs() < 1e-9);
        assert!(p1 > 0.9);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let mut dataset = Dataset::new(vec!["x".to_string()]);
        for i in 0..50 {
            dataset.add_sample(vec![i as f64], ((i * 7) % 11) as f64, i);
        }

        let mut a = RandomForest::new(ForestConfig { n_trees: 8, ..Default::default() });
        let mut b = RandomForest::new(ForestConfig { n_trees: 8, ..Default::default() });
        a.fit(&dataset);
        b.fit(&dataset);

        assert_eq!(a.predict(&dataset), b.predict(&dataset));
    }

    #[test]
    fn test_resolve_max_features() {
        assert_eq!(ForestConfig::classification().resolve_max_features(5), 2);
        assert_eq!(ForestConfig::regression().resolve_max_features(5), 5);
        assert_eq!(ForestConfig::classification().resolve_max_features(1), 1);
    }

    #[test]
    fn test_feature_ranking_sorted() {
        let mut dataset = Dataset::new(vec!["signal".to_string(), "constant".to_string()]);
        for i in 0..60 {
            dataset.add_sample(vec![i as f64, 1.0], (i / 30) as f64, i);
        }

        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 5,
            ..ForestConfig::classification()
        });
        forest.fit(&dataset);

        let ranking = forest.feature_importance_ranking();
        assert_eq!(ranking[0].0, "signal");
    }
}
