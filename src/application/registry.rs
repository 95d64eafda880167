//! Model registry: the loaded predictor artifacts.
//!
//! Loaded once at startup and shared read-only (`Arc<ModelRegistry>`) by every
//! prediction. A failure to load one artifact is recorded and never prevents
//! loading the other.

use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactKind, PredictorArtifact};
use crate::ports::ArtifactStore;

/// Health snapshot of the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStatus {
    pub binary_model_loaded: bool,
    pub probability_model_loaded: bool,
    /// One entry per artifact that failed to load
    pub load_errors: Vec<String>,
    /// Where artifacts were loaded from
    pub source: String,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// Immutable set of loaded predictors.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    binary: Option<PredictorArtifact>,
    probability: Option<PredictorArtifact>,
    load_errors: Vec<String>,
    source: String,
}

impl ModelRegistry {
    /// Load both artifact kinds from `store`. Never fails; absent or invalid
    /// artifacts leave their slot empty.
    pub fn load(store: &dyn ArtifactStore) -> Self {
        let source = store.describe();
        tracing::info!("Loading predictor artifacts from {source}");

        let mut load_errors = Vec::new();
        let mut load_one = |kind: ArtifactKind| match store.load(kind) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                tracing::warn!("{kind} artifact unavailable: {e}");
                load_errors.push(e.to_string());
                None
            }
        };

        let binary = load_one(ArtifactKind::Binary);
        let probability = load_one(ArtifactKind::Probability);

        let registry = Self {
            binary,
            probability,
            load_errors,
            source,
        };

        if !registry.has_binary() || !registry.has_probability() {
            tracing::warn!(
                "Registry incomplete (binary={}, probability={}); degraded prediction paths will be used",
                registry.has_binary(),
                registry.has_probability()
            );
        }

        registry
    }

    /// Registry built from already-loaded artifacts.
    #[must_use]
    pub fn from_artifacts(
        binary: Option<PredictorArtifact>,
        probability: Option<PredictorArtifact>,
    ) -> Self {
        Self {
            binary,
            probability,
            load_errors: Vec::new(),
            source: "in-memory".to_string(),
        }
    }

    #[must_use]
    pub fn has_binary(&self) -> bool {
        self.binary.is_some()
    }

    #[must_use]
    pub fn has_probability(&self) -> bool {
        self.probability.is_some()
    }

    #[must_use]
    pub fn binary(&self) -> Option<&PredictorArtifact> {
        self.binary.as_ref()
    }

    #[must_use]
    pub fn probability(&self) -> Option<&PredictorArtifact> {
        self.probability.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            binary_model_loaded: self.has_binary(),
            probability_model_loaded: self.has_probability(),
            load_errors: self.load_errors.clone(),
            source: self.source.clone(),
            checked_at: chrono::Utc::now(),
        }
    }
}
