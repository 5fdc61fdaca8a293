use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::artifact::ModelArtifact;
use super::features::{FeatureSchema, FeatureVector};
use crate::error::{Result, TrendError};
use crate::types::TrendClass;

/// One prediction: the arg-max class plus the full probability triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub trend: TrendClass,
    pub probabilities: TrendProbabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendProbabilities {
    #[serde(rename = "Bearish")]
    pub bearish: f64,
    #[serde(rename = "Stable")]
    pub stable: f64,
    #[serde(rename = "Bullish")]
    pub bullish: f64,
}

/// Applies a loaded artifact to feature vectors. Pure function of
/// (artifact, input): the artifact is never mutated, so one predictor can
/// serve any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct TrendPredictor {
    artifact: Arc<ModelArtifact>,
}

impl TrendPredictor {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn predict(&self, vector: &FeatureVector) -> Result<Prediction> {
        self.predict_slice(&vector.to_array())
    }

    pub fn predict_batch(&self, vectors: &[FeatureVector]) -> Result<Vec<Prediction>> {
        vectors.iter().map(|v| self.predict(v)).collect()
    }

    /// Predict from a raw feature slice in the documented order. The
    /// slice is validated against the artifact's schema before any
    /// scaler or classifier work.
    pub fn predict_slice(&self, features: &[f64]) -> Result<Prediction> {
        self.validate_schema(features)?;

        let scaled = self.artifact.scaler.transform_row(features)?;
        let probs = self.artifact.forest.predict_proba_one(&scaled);
        // First maximum wins on ties, matching class index order.
        let mut class_idx = 0;
        for (i, &p) in probs.iter().enumerate() {
            if p > probs[class_idx] {
                class_idx = i;
            }
        }

        Ok(Prediction {
            trend: TrendClass::from_index(class_idx).expect("class index in range"),
            probabilities: TrendProbabilities {
                bearish: probs[TrendClass::Bearish.index()],
                stable: probs[TrendClass::Stable.index()],
                bullish: probs[TrendClass::Bullish.index()],
            },
        })
    }

    fn validate_schema(&self, features: &[f64]) -> Result<()> {
        let schema = &self.artifact.schema;
        if schema.version != FeatureSchema::CURRENT_VERSION {
            return Err(TrendError::SchemaMismatch(format!(
                "artifact schema version {} but this build expects {}",
                schema.version,
                FeatureSchema::CURRENT_VERSION
            )));
        }
        if features.len() != schema.len() {
            return Err(TrendError::SchemaMismatch(format!(
                "expected {} features, got {}",
                schema.len(),
                features.len()
            )));
        }
        for (expected, actual) in schema.fields.iter().zip(FeatureVector::FEATURE_NAMES) {
            if expected != actual {
                return Err(TrendError::SchemaMismatch(format!(
                    "artifact expects field '{}' where this build supplies '{}'",
                    expected, actual
                )));
            }
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(TrendError::InputValidation(
                "feature vector contains a non-finite value".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingSettings;
    use crate::ml::features::{BuildReport, TrainingSet};
    use crate::ml::trainer;

    fn trained_predictor() -> TrendPredictor {
        let features: Vec<FeatureVector> = (0..90)
            .map(|i| {
                let x = i as f64 / 10.0;
                FeatureVector {
                    open: x,
                    high: x + 2.0,
                    low: x - 1.0,
                    close: x + 1.0,
                    volume: 1e5 + x,
                    market_cap: 5e9,
                    pe_ratio: 20.0,
                    dividend_yield: 2.5,
                    volatility: 0.02,
                    sentiment_score: (x / 9.0) * 2.0 - 1.0,
                    ma5: x,
                    ma20: x,
                    price_range: 3.0,
                    price_change: 1.0,
                }
            })
            .collect();
        let labels: Vec<TrendClass> = (0..90)
            .map(|i| TrendClass::from_index((i / 30) as usize).unwrap())
            .collect();
        let set = TrainingSet {
            features,
            labels,
            report: BuildReport::default(),
        };
        let settings = TrainingSettings {
            n_trees: 20,
            ..Default::default()
        };
        let (artifact, _) = trainer::train(&set, &settings).unwrap();
        TrendPredictor::new(Arc::new(artifact))
    }

    fn sample_vector() -> FeatureVector {
        FeatureVector {
            open: 100.0,
            high: 102.0,
            low: 99.0,
            close: 101.0,
            volume: 150_000.0,
            market_cap: 5_000_000_000.0,
            pe_ratio: 20.0,
            dividend_yield: 2.5,
            volatility: 0.02,
            sentiment_score: 0.5,
            ma5: 100.5,
            ma20: 100.2,
            price_range: 3.0,
            price_change: 1.0,
        }
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let predictor = trained_predictor();
        let prediction = predictor.predict(&sample_vector()).unwrap();
        let p = prediction.probabilities;
        assert!((p.bearish + p.stable + p.bullish - 1.0).abs() < 1e-6);
        for prob in [p.bearish, p.stable, p.bullish] {
            assert!((0.0..=1.0).contains(&prob));
        }
    }

    #[test]
    fn test_argmax_matches_reported_probabilities() {
        let predictor = trained_predictor();
        let prediction = predictor.predict(&sample_vector()).unwrap();
        let p = prediction.probabilities;
        let max = p.bearish.max(p.stable).max(p.bullish);
        let expected = if max == p.bearish {
            TrendClass::Bearish
        } else if max == p.stable {
            TrendClass::Stable
        } else {
            TrendClass::Bullish
        };
        assert_eq!(prediction.trend, expected);
    }

    #[test]
    fn test_prediction_is_pure() {
        let predictor = trained_predictor();
        let a = predictor.predict(&sample_vector()).unwrap();
        let b = predictor.predict(&sample_vector()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_length_rejected_before_inference() {
        let predictor = trained_predictor();
        assert!(matches!(
            predictor.predict_slice(&[1.0, 2.0, 3.0]),
            Err(TrendError::SchemaMismatch(_))
        ));
        let fifteen = vec![1.0; 15];
        assert!(matches!(
            predictor.predict_slice(&fifteen),
            Err(TrendError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_schema_version_mismatch_rejected_before_inference() {
        let predictor = trained_predictor();
        let mut artifact = predictor.artifact().clone();
        artifact.schema.version += 1;
        let stale = TrendPredictor::new(Arc::new(artifact));
        assert!(matches!(
            stale.predict_slice(&sample_vector().to_array()),
            Err(TrendError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let predictor = trained_predictor();
        let mut arr = sample_vector().to_array();
        arr[3] = f64::NAN;
        assert!(matches!(
            predictor.predict_slice(&arr),
            Err(TrendError::InputValidation(_))
        ));
    }

    #[test]
    fn test_batch_maps_single_path() {
        let predictor = trained_predictor();
        let vectors = vec![sample_vector(), sample_vector()];
        let batch = predictor.predict_batch(&vectors).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], batch[1]);
    }

    #[test]
    fn test_serialized_shape() {
        let predictor = trained_predictor();
        let prediction = predictor.predict(&sample_vector()).unwrap();
        let json = serde_json::to_value(&prediction).unwrap();
        assert!(json.get("trend").is_some());
        assert!(json["probabilities"].get("Bearish").is_some());
        assert!(json["probabilities"].get("Stable").is_some());
        assert!(json["probabilities"].get("Bullish").is_some());
    }
}
