use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::Result;
use crate::ml::artifact::ArtifactMetadata;
use crate::ml::{ArtifactStore, ModelArtifact, TrendPredictor};

/// Shared server state: the current artifact behind an atomic slot.
///
/// Requests clone the inner `Arc` and predict against an immutable
/// snapshot, so a concurrent reload never tears an in-flight prediction —
/// it only swaps which artifact the next request sees.
#[derive(Clone)]
pub struct AppState {
    artifact: Arc<RwLock<Arc<ModelArtifact>>>,
    store: ArtifactStore,
}

impl AppState {
    pub fn new(artifact: ModelArtifact, store: ArtifactStore) -> Self {
        Self {
            artifact: Arc::new(RwLock::new(Arc::new(artifact))),
            store,
        }
    }

    /// Predictor over the artifact currently in the slot.
    pub async fn predictor(&self) -> TrendPredictor {
        let snapshot = self.artifact.read().await.clone();
        TrendPredictor::new(snapshot)
    }

    pub async fn metadata(&self) -> ArtifactMetadata {
        self.artifact.read().await.metadata.clone()
    }

    /// Re-load the persisted pair and swap it in. On failure the current
    /// artifact stays in place and the error is surfaced to the caller.
    pub async fn reload(&self) -> Result<ArtifactMetadata> {
        let fresh = self.store.load()?;
        let metadata = fresh.metadata.clone();
        *self.artifact.write().await = Arc::new(fresh);
        info!(trained_at = %metadata.trained_at, "swapped in reloaded artifact");
        Ok(metadata)
    }
}
