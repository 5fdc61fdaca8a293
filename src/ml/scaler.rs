use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrendError};

/// Per-feature standardization (zero mean, unit variance), fit once on
/// training rows and reused verbatim at inference time. Columns with
/// near-zero variance transform to 0.0 instead of dividing by noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

const MIN_STD: f64 = 1e-10;

impl StandardScaler {
    /// Fit on a feature matrix. Statistics come from these rows only;
    /// leakage control is the caller's concern (the trainer passes the
    /// training partition exclusively).
    pub fn fit(features: &Array2<f64>) -> Result<Self> {
        let n = features.nrows();
        if n == 0 {
            return Err(TrendError::TrainingPrecondition(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let means = features
            .mean_axis(Axis(0))
            .expect("non-empty matrix has column means")
            .to_vec();
        let stds = features
            .axis_iter(Axis(1))
            .zip(&means)
            .map(|(col, &mean)| {
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
                var.sqrt()
            })
            .collect();

        Ok(Self { means, stds })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    /// Transform one row into scaled feature space.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features() {
            return Err(TrendError::SchemaMismatch(format!(
                "expected {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&v, (&mean, &std))| {
                if std > MIN_STD {
                    (v - mean) / std
                } else {
                    0.0
                }
            })
            .collect())
    }

    /// Transform a full matrix with the fitted statistics.
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features() {
            return Err(TrendError::SchemaMismatch(format!(
                "expected {} features, got {}",
                self.n_features(),
                features.ncols()
            )));
        }
        let mut scaled = features.clone();
        for (j, (&mean, &std)) in self.means.iter().zip(&self.stds).enumerate() {
            for value in scaled.column_mut(j) {
                *value = if std > MIN_STD { (*value - mean) / std } else { 0.0 };
            }
        }
        Ok(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_computes_column_statistics() {
        let features = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(&features).unwrap();

        assert_eq!(scaler.means, vec![3.0, 10.0]);
        let expected_std = (8.0f64 / 3.0).sqrt();
        assert!((scaler.stds[0] - expected_std).abs() < 1e-12);
        assert!(scaler.stds[1].abs() < 1e-12);
    }

    #[test]
    fn test_transform_standardizes_and_guards_zero_variance() {
        let features = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(&features).unwrap();
        let scaled = scaler.transform(&features).unwrap();

        // Column 0: zero mean, unit variance.
        let col0: Vec<f64> = scaled.column(0).to_vec();
        let mean: f64 = col0.iter().sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        // Constant column maps to zero rather than NaN.
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_row_matches_matrix_transform() {
        let features = array![[1.0, 2.0], [3.0, 6.0], [5.0, 4.0]];
        let scaler = StandardScaler::fit(&features).unwrap();
        let scaled = scaler.transform(&features).unwrap();
        let row = scaler.transform_row(&[3.0, 6.0]).unwrap();
        assert_eq!(row, scaled.row(1).to_vec());
    }

    #[test]
    fn test_wrong_width_rejected() {
        let features = array![[1.0, 2.0], [3.0, 4.0]];
        let scaler = StandardScaler::fit(&features).unwrap();
        assert!(scaler.transform_row(&[1.0]).is_err());
        assert!(scaler.transform_row(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let features = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(&features).is_err());
    }
}
