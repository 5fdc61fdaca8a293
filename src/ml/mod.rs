pub mod artifact;
pub mod features;
pub mod forest;
pub mod predictor;
pub mod scaler;
pub mod trainer;
pub mod tree;

pub use artifact::{ArtifactStore, ModelArtifact};
pub use features::{build_training_set, FeatureSchema, FeatureVector, PredictionInput};
pub use predictor::{Prediction, TrendPredictor};
pub use trainer::{train, EvaluationReport};
