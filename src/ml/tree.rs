use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::types::NUM_CLASSES;

/// Single classification tree over dense `f64` rows. Labels are class
/// indices in `0..NUM_CLASSES`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all).
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        /// Class frequencies among the training rows that reached this leaf.
        probs: [f64; NUM_CLASSES],
        n_samples: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self { config, root: None }
    }

    /// Fit on the rows selected by `indices`.
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[usize], indices: &[usize]) {
        debug_assert_eq!(features.len(), labels.len());
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.root = Some(self.build_node(features, labels, indices, 0, &mut rng));
    }

    fn build_node(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let counts = class_counts(labels, indices);
        let impurity = gini(&counts);

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || impurity < 1e-10
        {
            return leaf(&counts);
        }

        match self.find_best_split(features, labels, indices, impurity, rng) {
            Some((feature_idx, threshold, left_idx, right_idx)) => {
                if left_idx.len() < self.config.min_samples_leaf
                    || right_idx.len() < self.config.min_samples_leaf
                {
                    return leaf(&counts);
                }
                let left = self.build_node(features, labels, &left_idx, depth + 1, rng);
                let right = self.build_node(features, labels, &right_idx, depth + 1, rng);
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => leaf(&counts),
        }
    }

    fn find_best_split(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
        let n_features = features.first()?.len();
        let max_features = self.config.max_features.unwrap_or(n_features);

        let mut feature_indices: Vec<usize> = (0..n_features).collect();
        feature_indices.shuffle(rng);
        feature_indices.truncate(max_features);

        let mut best_gain = 0.0;
        let mut best: Option<(usize, f64, Vec<usize>, Vec<usize>)> = None;

        for &feature_idx in &feature_indices {
            let mut values: Vec<f64> = indices
                .iter()
                .map(|&i| features[i][feature_idx])
                .collect();
            values.sort_by(|a, b| a.partial_cmp(b).expect("finite feature values"));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| features[i][feature_idx] <= threshold);
                if left_idx.is_empty() || right_idx.is_empty() {
                    continue;
                }

                let left_impurity = gini(&class_counts(labels, &left_idx));
                let right_impurity = gini(&class_counts(labels, &right_idx));

                let n_left = left_idx.len() as f64;
                let n_right = right_idx.len() as f64;
                let weighted =
                    (n_left * left_impurity + n_right * right_impurity) / (n_left + n_right);
                let gain = parent_impurity - weighted;

                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature_idx, threshold, left_idx, right_idx));
                }
            }
        }

        best
    }

    /// Class-frequency vector at the leaf this row falls into.
    pub fn predict_proba_one(&self, row: &[f64]) -> [f64; NUM_CLASSES] {
        match &self.root {
            Some(node) => traverse(node, row),
            None => uniform(),
        }
    }

    /// Arg-max class index for this row.
    pub fn predict_one(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba_one(row))
    }
}

fn traverse(node: &TreeNode, row: &[f64]) -> [f64; NUM_CLASSES] {
    match node {
        TreeNode::Leaf { probs, .. } => *probs,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
        } => {
            if row[*feature_idx] <= *threshold {
                traverse(left, row)
            } else {
                traverse(right, row)
            }
        }
    }
}

fn leaf(counts: &[usize; NUM_CLASSES]) -> TreeNode {
    let n: usize = counts.iter().sum();
    let probs = if n == 0 {
        uniform()
    } else {
        let mut probs = [0.0; NUM_CLASSES];
        for (p, &c) in probs.iter_mut().zip(counts) {
            *p = c as f64 / n as f64;
        }
        probs
    };
    TreeNode::Leaf { probs, n_samples: n }
}

fn class_counts(labels: &[usize], indices: &[usize]) -> [usize; NUM_CLASSES] {
    let mut counts = [0usize; NUM_CLASSES];
    for &i in indices {
        counts[labels[i]] += 1;
    }
    counts
}

fn gini(counts: &[usize; NUM_CLASSES]) -> f64 {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn uniform() -> [f64; NUM_CLASSES] {
    [1.0 / NUM_CLASSES as f64; NUM_CLASSES]
}

pub(crate) fn argmax(probs: &[f64; NUM_CLASSES]) -> usize {
    let mut best = 0;
    for (i, &p) in probs.iter().enumerate() {
        if p > probs[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_band_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        // One informative feature in three bands, one noise feature.
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let x = i as f64 / 10.0;
            let label = if x < 2.0 {
                0
            } else if x < 4.0 {
                1
            } else {
                2
            };
            features.push(vec![x, (i % 7) as f64]);
            labels.push(label);
        }
        (features, labels)
    }

    #[test]
    fn test_fits_separable_three_class_data() {
        let (features, labels) = three_band_data();
        let indices: Vec<usize> = (0..features.len()).collect();

        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&features, &labels, &indices);

        let correct = indices
            .iter()
            .filter(|&&i| tree.predict_one(&features[i]) == labels[i])
            .count();
        assert!(correct as f64 / features.len() as f64 > 0.95);
    }

    #[test]
    fn test_leaf_probabilities_sum_to_one() {
        let (features, labels) = three_band_data();
        let indices: Vec<usize> = (0..features.len()).collect();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&features, &labels, &indices);

        for row in &features {
            let probs = tree.predict_proba_one(row);
            let sum: f64 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(probs.iter().all(|&p| p >= 0.0));
        }
    }

    #[test]
    fn test_gini_bounds() {
        assert_eq!(gini(&[10, 0, 0]), 0.0);
        let mixed = gini(&[10, 10, 10]);
        assert!((mixed - (1.0 - 3.0 * (1.0 / 9.0))).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_tree_returns_uniform() {
        let tree = DecisionTree::new(TreeConfig::default());
        let probs = tree.predict_proba_one(&[1.0, 2.0]);
        assert_eq!(probs, uniform());
    }
}
