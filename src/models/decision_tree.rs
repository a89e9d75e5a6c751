//! Decision Tree implementation

use crate::data::Dataset;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree (None = grow until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Maximum features to consider for split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Task type
    pub task: TaskType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Regression,
    Classification,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
            task: TaskType::Regression,
        }
    }
}

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Feature index for split
    pub feature_idx: Option<usize>,
    /// Threshold for split (go left when `x <= threshold`)
    pub threshold: Option<f64>,
    /// Prediction value (mean for regression, class for classification)
    pub value: f64,
    /// Class probabilities `[P(0), P(1)]` (classification leaves only)
    pub class_probs: Option<[f64; 2]>,
    /// Number of samples in this node
    pub n_samples: usize,
    /// Left child
    pub left: Option<Box<TreeNode>>,
    /// Right child
    pub right: Option<Box<TreeNode>>,
    /// Impurity at this node
    pub impurity: f64,
}

impl TreeNode {
    fn leaf(value: f64, class_probs: Option<[f64; 2]>, n_samples: usize, impurity: f64) -> Self {
        Self {
            feature_idx: None,
            threshold: None,
            value,
            class_probs,
            n_samples,
            left: None,
            right: None,
            impurity,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn depth(&self) -> usize {
        let left = self.left.as_ref().map(|n| n.depth()).unwrap_or(0);
        let right = self.right.as_ref().map(|n| n.depth()).unwrap_or(0);
        1 + left.max(right)
    }

    pub fn n_leaves(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.left.as_ref().map(|n| n.n_leaves()).unwrap_or(0)
                + self.right.as_ref().map(|n| n.n_leaves()).unwrap_or(0)
        }
    }

    /// Leaf reached by a sample
    fn find_leaf(&self, features: &[f64]) -> &TreeNode {
        let mut node = self;
        while let (Some(idx), Some(threshold), Some(left), Some(right)) =
            (node.feature_idx, node.threshold, &node.left, &node.right)
        {
            node = if features[idx] <= threshold { &**left } else { &**right };
        }
        node
    }
}

/// Running label statistics for one side of a candidate split
///
/// Sums are accumulated around `shift` (the parent node's mean) so the
/// variance keeps its precision whatever the magnitude of the labels.
#[derive(Debug, Clone, Copy, Default)]
struct SideStats {
    shift: f64,
    n: f64,
    sum: f64,
    sum_sq: f64,
    positives: f64,
}

impl SideStats {
    fn empty(shift: f64) -> Self {
        Self {
            shift,
            ..Self::default()
        }
    }

    fn from_labels(labels: &[f64]) -> Self {
        let shift = if labels.is_empty() {
            0.0
        } else {
            labels.iter().sum::<f64>() / labels.len() as f64
        };
        let mut stats = Self::empty(shift);
        for &y in labels {
            stats.push(y);
        }
        stats
    }

    fn push(&mut self, y: f64) {
        let d = y - self.shift;
        self.n += 1.0;
        self.sum += d;
        self.sum_sq += d * d;
        if y > 0.0 {
            self.positives += 1.0;
        }
    }

    fn minus(&self, other: &SideStats) -> SideStats {
        SideStats {
            shift: self.shift,
            n: self.n - other.n,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
            positives: self.positives - other.positives,
        }
    }

    fn mean(&self) -> f64 {
        self.shift + self.sum / self.n
    }

    fn impurity(&self, task: TaskType) -> f64 {
        if self.n == 0.0 {
            return 0.0;
        }
        match task {
            TaskType::Regression => {
                let mean = self.sum / self.n;
                (self.sum_sq / self.n - mean * mean).max(0.0)
            }
            TaskType::Classification => {
                let p = self.positives / self.n;
                2.0 * p * (1.0 - p)
            }
        }
    }
}

/// Chosen split for a node
struct BestSplit {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision Tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
}

impl DecisionTree {
    /// Create a new decision tree with config
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            root: None,
            feature_names: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn default_regression() -> Self {
        Self::new(TreeConfig::default())
    }

    pub fn default_classification() -> Self {
        Self::new(TreeConfig {
            task: TaskType::Classification,
            ..Default::default()
        })
    }

    /// Train the decision tree
    pub fn fit(&mut self, dataset: &Dataset) {
        self.feature_names = dataset.feature_names.clone();
        self.feature_importances = vec![0.0; dataset.n_features()];

        if dataset.is_empty() {
            self.root = None;
            return;
        }

        let indices: Vec<usize> = (0..dataset.n_samples()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        self.root = Some(self.build_tree(dataset, indices, 0, &mut rng));

        // Normalize feature importances
        let sum: f64 = self.feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= sum;
            }
        }
    }

    /// Build tree recursively
    fn build_tree(
        &mut self,
        dataset: &Dataset,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = indices.len();
        let labels: Vec<f64> = indices.iter().map(|&i| dataset.labels[i]).collect();
        let stats = SideStats::from_labels(&labels);
        let impurity = stats.impurity(self.config.task);
        let pure = labels.iter().all(|&y| y == labels[0]);

        let depth_reached = self.config.max_depth.map_or(false, |max| depth >= max);
        if depth_reached
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
            || pure
        {
            return self.create_leaf(&stats, impurity);
        }

        let split = match self.find_best_split(dataset, &indices, &stats, impurity, rng) {
            Some(split) => split,
            None => return self.create_leaf(&stats, impurity),
        };

        self.feature_importances[split.feature_idx] += split.gain * n as f64;

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| dataset.features[i][split.feature_idx] <= split.threshold);

        let left = self.build_tree(dataset, left_idx, depth + 1, rng);
        let right = self.build_tree(dataset, right_idx, depth + 1, rng);

        TreeNode {
            feature_idx: Some(split.feature_idx),
            threshold: Some(split.threshold),
            value: stats.mean(),
            class_probs: None,
            n_samples: n,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            impurity,
        }
    }

    /// Create a leaf node
    fn create_leaf(&self, stats: &SideStats, impurity: f64) -> TreeNode {
        let n = stats.n as usize;
        match self.config.task {
            TaskType::Regression => TreeNode::leaf(stats.mean(), None, n, impurity),
            TaskType::Classification => {
                let p = stats.positives / stats.n;
                let value = if p > 0.5 { 1.0 } else { 0.0 };
                TreeNode::leaf(value, Some([1.0 - p, p]), n, impurity)
            }
        }
    }

    /// Find the best split by sweeping each candidate feature in sorted order
    ///
    /// Features are visited in a random order; constant features do not
    /// count towards `max_features`.
    fn find_best_split(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        parent: &SideStats,
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let n_features = dataset.n_features();
        let max_features = self.config.max_features.unwrap_or(n_features).clamp(1, n_features);
        let min_leaf = self.config.min_samples_leaf as f64;
        let task = self.config.task;

        let mut feature_indices: Vec<usize> = (0..n_features).collect();
        feature_indices.shuffle(rng);

        let mut best: Option<BestSplit> = None;
        let mut visited = 0;

        for feature_idx in feature_indices {
            if visited >= max_features {
                break;
            }

            let mut pairs: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (dataset.features[i][feature_idx], dataset.labels[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            if pairs[0].0 == pairs[pairs.len() - 1].0 {
                continue;
            }
            visited += 1;

            let mut left = SideStats::empty(parent.shift);
            for w in 0..pairs.len() - 1 {
                left.push(pairs[w].1);

                let (x, next_x) = (pairs[w].0, pairs[w + 1].0);
                if next_x <= x {
                    continue;
                }

                let right = parent.minus(&left);
                if left.n < min_leaf || right.n < min_leaf {
                    continue;
                }

                let weighted =
                    (left.n * left.impurity(task) + right.n * right.impurity(task)) / parent.n;
                let gain = parent_impurity - weighted;

                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mid = x + (next_x - x) / 2.0;
                    let threshold = if mid >= next_x { x } else { mid };
                    best = Some(BestSplit {
                        feature_idx,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Predict for a single sample
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        match &self.root {
            Some(node) => node.find_leaf(features).value,
            None => 0.0,
        }
    }

    /// Predict `[P(0), P(1)]` for classification
    pub fn predict_proba_one(&self, features: &[f64]) -> [f64; 2] {
        match &self.root {
            Some(node) => node.find_leaf(features).class_probs.unwrap_or([0.5, 0.5]),
            None => [0.5, 0.5],
        }
    }

    /// Predict for multiple samples
    pub fn predict(&self, dataset: &Dataset) -> Vec<f64> {
        dataset
            .features
            .iter()
            .map(|f| self.predict_one(f))
            .collect()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Depth of the fitted tree (0 when unfitted)
    pub fn depth(&self) -> usize {
        self.root.as_ref().map(|n| n.depth()).unwrap_or(0)
    }

    /// Number of leaves of the fitted tree
    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map(|n| n.n_leaves()).unwrap_or(0)
    }
}
