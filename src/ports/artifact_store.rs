//! Artifact store port: where trained predictor bundles come from.
//!
//! This trait abstracts the artifact location and format (signed JSON bundles
//! on disk) from the model registry.

use crate::domain::{ArtifactKind, ArtifactLoadError, PredictorArtifact};

/// Source of serialized predictor artifacts.
///
/// Each kind is loaded independently: a failure for one kind must not
/// prevent loading the other.
pub trait ArtifactStore: Send + Sync {
    /// Load and validate the artifact of the given kind.
    ///
    /// # Errors
    /// Returns `ArtifactLoadError::NotFound` when the bundle is absent, or
    /// another variant when it exists but cannot be used.
    fn load(&self, kind: ArtifactKind) -> Result<PredictorArtifact, ArtifactLoadError>;

    /// Human-readable location, for logs and health output.
    fn describe(&self) -> String;
}
