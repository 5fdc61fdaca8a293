use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::features::FeatureSchema;
use super::forest::RandomForest;
use super::scaler::StandardScaler;
use crate::error::{Result, TrendError};

pub const SCALER_FILE: &str = "scaler.json";
pub const FOREST_FILE: &str = "forest.json";

/// Provenance recorded with both artifact halves. `trained_at` doubles as
/// the run identifier used to detect halves from different runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub trained_at: DateTime<Utc>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub accuracy: f64,
}

/// One completed training run: the fitted scaler and classifier, tagged
/// with the feature schema they expect. Immutable after creation;
/// retraining produces a new artifact rather than patching this one.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub schema: FeatureSchema,
    pub scaler: StandardScaler,
    pub forest: RandomForest,
    pub metadata: ArtifactMetadata,
}

#[derive(Serialize, Deserialize)]
struct ScalerBlob {
    schema: FeatureSchema,
    metadata: ArtifactMetadata,
    scaler: StandardScaler,
}

#[derive(Serialize, Deserialize)]
struct ForestBlob {
    schema: FeatureSchema,
    metadata: ArtifactMetadata,
    forest: RandomForest,
}

/// Persists the (scaler, classifier) pair as two co-located JSON blobs
/// under one directory. Save is atomic per file; load is all-or-nothing
/// and cross-checks that both halves came from the same run.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let scaler_blob = ScalerBlob {
            schema: artifact.schema.clone(),
            metadata: artifact.metadata.clone(),
            scaler: artifact.scaler.clone(),
        };
        let forest_blob = ForestBlob {
            schema: artifact.schema.clone(),
            metadata: artifact.metadata.clone(),
            forest: artifact.forest.clone(),
        };

        write_atomic(
            &self.dir.join(SCALER_FILE),
            &serde_json::to_vec(&scaler_blob)?,
        )?;
        write_atomic(
            &self.dir.join(FOREST_FILE),
            &serde_json::to_vec(&forest_blob)?,
        )?;

        info!(dir = %self.dir.display(), "saved model artifact");
        Ok(())
    }

    pub fn load(&self) -> Result<ModelArtifact> {
        let scaler_path = self.dir.join(SCALER_FILE);
        let forest_path = self.dir.join(FOREST_FILE);

        // Both halves must be present before either is parsed.
        for path in [&scaler_path, &forest_path] {
            if !path.exists() {
                return Err(TrendError::ArtifactMissing { path: path.clone() });
            }
        }

        let scaler_blob: ScalerBlob = read_blob(&scaler_path)?;
        let forest_blob: ForestBlob = read_blob(&forest_path)?;

        if scaler_blob.schema != forest_blob.schema {
            return Err(TrendError::ArtifactCorrupt {
                reason: "scaler and classifier carry different feature schemas".to_string(),
            });
        }
        if scaler_blob.metadata.trained_at != forest_blob.metadata.trained_at {
            return Err(TrendError::ArtifactCorrupt {
                reason: "scaler and classifier come from different training runs".to_string(),
            });
        }
        if scaler_blob.scaler.n_features() != scaler_blob.schema.len()
            || forest_blob.forest.n_features() != forest_blob.schema.len()
        {
            return Err(TrendError::ArtifactCorrupt {
                reason: "fitted feature width disagrees with the embedded schema".to_string(),
            });
        }

        info!(
            dir = %self.dir.display(),
            trained_at = %scaler_blob.metadata.trained_at,
            "loaded model artifact"
        );

        Ok(ModelArtifact {
            schema: scaler_blob.schema,
            scaler: scaler_blob.scaler,
            forest: forest_blob.forest,
            metadata: forest_blob.metadata,
        })
    }
}

fn read_blob<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| TrendError::ArtifactCorrupt {
        reason: format!("{}: {}", path.display(), e),
    })
}

/// Write-then-rename so a concurrent load never sees a half-written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::forest::ForestConfig;
    use ndarray::Array2;

    fn fitted_artifact(seed: u64) -> ModelArtifact {
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let x = i as f64;
                (0..14).map(|j| x + j as f64).collect()
            })
            .collect();
        let labels: Vec<usize> = (0..60).map(|i| i % 3).collect();

        let matrix = Array2::from_shape_vec(
            (rows.len(), 14),
            rows.iter().flatten().copied().collect(),
        )
        .unwrap();
        let scaler = StandardScaler::fit(&matrix).unwrap();

        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 5,
            seed,
            ..Default::default()
        });
        forest.fit(&rows, &labels).unwrap();

        ModelArtifact {
            schema: FeatureSchema::current(),
            scaler,
            forest,
            metadata: ArtifactMetadata {
                trained_at: Utc::now(),
                train_samples: 48,
                test_samples: 12,
                accuracy: 0.5,
            },
        }
    }

    #[test]
    fn test_round_trip_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let artifact = fitted_artifact(7);

        store.save(&artifact).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.schema, artifact.schema);
        assert_eq!(loaded.metadata, artifact.metadata);
        let row: Vec<f64> = (0..14).map(|j| 3.0 + j as f64).collect();
        let scaled = artifact.scaler.transform_row(&row).unwrap();
        let reloaded_scaled = loaded.scaler.transform_row(&row).unwrap();
        assert_eq!(scaled, reloaded_scaled);
        assert_eq!(
            artifact.forest.predict_proba_one(&scaled),
            loaded.forest.predict_proba_one(&reloaded_scaled)
        );
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nothing-here"));
        assert!(matches!(
            store.load(),
            Err(TrendError::ArtifactMissing { .. })
        ));
    }

    #[test]
    fn test_one_half_absent_is_missing_not_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&fitted_artifact(7)).unwrap();

        std::fs::remove_file(dir.path().join(FOREST_FILE)).unwrap();
        assert!(matches!(
            store.load(),
            Err(TrendError::ArtifactMissing { .. })
        ));
    }

    #[test]
    fn test_corrupted_half_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&fitted_artifact(7)).unwrap();

        std::fs::write(dir.path().join(SCALER_FILE), b"{ not json").unwrap();
        assert!(matches!(
            store.load(),
            Err(TrendError::ArtifactCorrupt { .. })
        ));
    }

    #[test]
    fn test_mixed_runs_detected() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        ArtifactStore::new(dir_a.path())
            .save(&fitted_artifact(1))
            .unwrap();
        // A later run sharing the same schema but a different timestamp.
        std::thread::sleep(std::time::Duration::from_millis(5));
        ArtifactStore::new(dir_b.path())
            .save(&fitted_artifact(2))
            .unwrap();

        // Replace one half with the other run's half.
        std::fs::copy(
            dir_b.path().join(FOREST_FILE),
            dir_a.path().join(FOREST_FILE),
        )
        .unwrap();

        assert!(matches!(
            ArtifactStore::new(dir_a.path()).load(),
            Err(TrendError::ArtifactCorrupt { .. })
        ));
    }
}
