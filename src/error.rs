use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the training and prediction pipeline.
#[derive(Debug, Error)]
pub enum TrendError {
    /// A field failed validation: non-numeric, out of range, or an
    /// unrecognized trend label.
    #[error("invalid input: {0}")]
    InputValidation(String),

    /// No artifact persisted at the expected location.
    #[error("model artifact not found at {path}")]
    ArtifactMissing { path: PathBuf },

    /// An artifact half failed to deserialize, or the two halves do not
    /// belong to the same training run.
    #[error("model artifact corrupt: {reason}")]
    ArtifactCorrupt { reason: String },

    /// A feature vector's shape or declared schema disagrees with the
    /// schema the artifact was trained against.
    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The dataset cannot support training (empty after exclusions, or a
    /// class with no examples).
    #[error("training precondition failed: {0}")]
    TrainingPrecondition(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrendError>;
