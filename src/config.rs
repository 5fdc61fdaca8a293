use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TrendError};

/// Runtime configuration, optionally loaded from a TOML file. Every field
/// has a default so the binary runs without any file present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the persisted artifact pair.
    pub artifacts_dir: PathBuf,
    pub training: TrainingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            training: TrainingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub seed: u64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Held-out share of the dataset.
    pub test_fraction: f64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            test_fraction: 0.2,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file if it exists, otherwise fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let config: AppConfig = toml::from_str(&raw)
                .map_err(|e| TrendError::InputValidation(format!("{}: {}", path.display(), e)))?;
            info!(path = %path.display(), "loaded configuration");
            config
        } else {
            AppConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.training.n_trees == 0 {
            errors.push("training.n_trees must be > 0".to_string());
        }
        if self.training.max_depth == 0 {
            errors.push("training.max_depth must be > 0".to_string());
        }
        if self.training.min_samples_split < 2 {
            errors.push("training.min_samples_split must be >= 2".to_string());
        }
        if self.training.min_samples_leaf == 0 {
            errors.push("training.min_samples_leaf must be > 0".to_string());
        }
        if !(self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0) {
            errors.push("training.test_fraction must be in (0, 1)".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TrendError::InputValidation(errors.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_fraction_rejected() {
        let mut config = AppConfig::default();
        config.training.test_fraction = 1.5;
        assert!(config.validate().is_err());
        config.training.test_fraction = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.training.n_trees, 100);
        assert_eq!(config.training.seed, 42);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "artifacts_dir = \"models\"\n[training]\nseed = 7\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.artifacts_dir, PathBuf::from("models"));
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.n_trees, 100);
    }
}
