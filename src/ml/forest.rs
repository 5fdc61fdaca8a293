use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::tree::{argmax, DecisionTree, TreeConfig};
use crate::error::{Result, TrendError};
use crate::types::NUM_CLASSES;

/// Bagged ensemble of classification trees. Class probabilities are the
/// fractions of trees voting for each class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fit on the full matrix. Trees are built sequentially with seeds
    /// derived from the run seed, so identical input reproduces an
    /// identical forest.
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[usize]) -> Result<()> {
        if features.is_empty() {
            return Err(TrendError::TrainingPrecondition(
                "cannot fit forest on an empty matrix".to_string(),
            ));
        }
        if features.len() != labels.len() {
            return Err(TrendError::TrainingPrecondition(format!(
                "feature/label length mismatch: {} vs {}",
                features.len(),
                labels.len()
            )));
        }

        self.n_features = features[0].len();
        let max_features = (self.n_features as f64).sqrt().ceil() as usize;
        let n = features.len();

        self.trees = (0..self.config.n_trees)
            .map(|i| {
                let tree_seed = self.config.seed.wrapping_add(i as u64);
                let tree_config = TreeConfig {
                    max_depth: self.config.max_depth,
                    min_samples_split: self.config.min_samples_split,
                    min_samples_leaf: self.config.min_samples_leaf,
                    max_features: Some(max_features),
                    seed: tree_seed,
                };

                let indices = bootstrap_indices(n, tree_seed);
                let mut tree = DecisionTree::new(tree_config);
                tree.fit(features, labels, &indices);
                tree
            })
            .collect();

        Ok(())
    }

    /// Vote-fraction probability triple for one row.
    pub fn predict_proba_one(&self, row: &[f64]) -> [f64; NUM_CLASSES] {
        if self.trees.is_empty() {
            return [1.0 / NUM_CLASSES as f64; NUM_CLASSES];
        }
        let mut votes = [0usize; NUM_CLASSES];
        for tree in &self.trees {
            votes[tree.predict_one(row)] += 1;
        }
        let total = self.trees.len() as f64;
        let mut probs = [0.0; NUM_CLASSES];
        for (p, &v) in probs.iter_mut().zip(&votes) {
            *p = v as f64 / total;
        }
        probs
    }

    /// Majority-vote class index for one row.
    pub fn predict_one(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba_one(row))
    }
}

fn bootstrap_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}
