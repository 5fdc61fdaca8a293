use std::fmt;

use chrono::Utc;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::artifact::{ArtifactMetadata, ModelArtifact};
use super::features::{FeatureSchema, FeatureVector, TrainingSet};
use super::forest::{ForestConfig, RandomForest};
use super::scaler::StandardScaler;
use crate::config::TrainingSettings;
use crate::error::{Result, TrendError};
use crate::types::{TrendClass, NUM_CLASSES};

/// Held-out metrics for one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub label: TrendClass,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Evaluation of one training run on its held-out partition. Reported,
/// never fed back into the model.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub classes: [ClassMetrics; NUM_CLASSES],
    pub train_samples: usize,
    pub test_samples: usize,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "accuracy: {:.4} ({} train / {} test)",
            self.accuracy, self.train_samples, self.test_samples
        )?;
        writeln!(
            f,
            "{:<10} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1", "support"
        )?;
        for metrics in &self.classes {
            writeln!(
                f,
                "{:<10} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                metrics.label, metrics.precision, metrics.recall, metrics.f1, metrics.support
            )?;
        }
        Ok(())
    }
}

/// Train a (scaler, classifier) pair from a featurized dataset.
///
/// The 80/20 shuffle-split is deterministic in the configured seed, the
/// scaler is fit on the training partition only, and the forest sees only
/// scaled training rows. Nothing is persisted here.
pub fn train(set: &TrainingSet, settings: &TrainingSettings) -> Result<(ModelArtifact, EvaluationReport)> {
    let n = set.features.len();
    check_preconditions(n, &set.labels)?;

    let (train_idx, test_idx) = split_indices(n, settings.test_fraction, settings.seed)?;
    info!(
        total = n,
        train = train_idx.len(),
        test = test_idx.len(),
        seed = settings.seed,
        "partitioned dataset"
    );

    let train_matrix = to_matrix(&set.features, &train_idx);
    let test_matrix = to_matrix(&set.features, &test_idx);

    // Anti-leakage: scaler statistics come from the training rows only.
    let scaler = StandardScaler::fit(&train_matrix)?;
    let train_scaled = rows_of(&scaler.transform(&train_matrix)?);
    let test_scaled = rows_of(&scaler.transform(&test_matrix)?);

    let train_labels: Vec<usize> = train_idx.iter().map(|&i| set.labels[i].index()).collect();
    let test_labels: Vec<usize> = test_idx.iter().map(|&i| set.labels[i].index()).collect();

    let mut forest = RandomForest::new(ForestConfig {
        n_trees: settings.n_trees,
        max_depth: settings.max_depth,
        min_samples_split: settings.min_samples_split,
        min_samples_leaf: settings.min_samples_leaf,
        seed: settings.seed,
    });
    forest.fit(&train_scaled, &train_labels)?;

    let report = evaluate(&forest, &test_scaled, &test_labels, train_idx.len());

    let artifact = ModelArtifact {
        schema: FeatureSchema::current(),
        scaler,
        forest,
        metadata: ArtifactMetadata {
            trained_at: Utc::now(),
            train_samples: train_idx.len(),
            test_samples: test_idx.len(),
            accuracy: report.accuracy,
        },
    };

    Ok((artifact, report))
}

fn check_preconditions(n: usize, labels: &[TrendClass]) -> Result<()> {
    if n == 0 {
        return Err(TrendError::TrainingPrecondition(
            "dataset is empty after exclusions".to_string(),
        ));
    }
    let mut counts = [0usize; NUM_CLASSES];
    for label in labels {
        counts[label.index()] += 1;
    }
    for class in TrendClass::ALL {
        if counts[class.index()] == 0 {
            return Err(TrendError::TrainingPrecondition(format!(
                "no examples of class {}",
                class
            )));
        }
    }
    Ok(())
}

/// Deterministic shuffle-split: same (n, fraction, seed) always yields the
/// same partition. Both partitions are guaranteed non-empty.
pub(crate) fn split_indices(n: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_len = ((n as f64 * test_fraction).round() as usize).max(1);
    if test_len >= n {
        return Err(TrendError::TrainingPrecondition(format!(
            "{} rows cannot support a {:.0}% held-out split",
            n,
            test_fraction * 100.0
        )));
    }

    let test_idx = indices.split_off(n - test_len);
    Ok((indices, test_idx))
}

fn to_matrix(features: &[FeatureVector], indices: &[usize]) -> Array2<f64> {
    let mut matrix = Array2::zeros((indices.len(), FeatureVector::NUM_FEATURES));
    for (row, &i) in indices.iter().enumerate() {
        for (col, value) in features[i].to_array().into_iter().enumerate() {
            matrix[[row, col]] = value;
        }
    }
    matrix
}

fn rows_of(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|r| r.to_vec()).collect()
}

fn evaluate(
    forest: &RandomForest,
    test_features: &[Vec<f64>],
    test_labels: &[usize],
    train_samples: usize,
) -> EvaluationReport {
    let mut confusion = [[0usize; NUM_CLASSES]; NUM_CLASSES];
    for (row, &actual) in test_features.iter().zip(test_labels) {
        let predicted = forest.predict_one(row);
        confusion[actual][predicted] += 1;
    }

    let correct: usize = (0..NUM_CLASSES).map(|k| confusion[k][k]).sum();
    let total = test_labels.len();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };

    let classes = TrendClass::ALL.map(|class| {
        let k = class.index();
        let tp = confusion[k][k];
        let predicted: usize = (0..NUM_CLASSES).map(|a| confusion[a][k]).sum();
        let actual: usize = confusion[k].iter().sum();

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, actual);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        ClassMetrics {
            label: class,
            precision,
            recall,
            f1,
            support: actual,
        }
    });

    EvaluationReport {
        accuracy,
        classes,
        train_samples,
        test_samples: total,
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}
