//! Ports layer: Trait definitions for external collaborators.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the prediction pipeline and the outside world (artifact storage,
//! narrative generation).

mod artifact_store;
mod narrative;

pub use artifact_store::ArtifactStore;
pub use narrative::{NarrativeError, NarrativeRequest, NarrativeSynthesizer};
