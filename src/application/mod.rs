//! Application layer: Use cases and services.
//!
//! This module wires the pure domain pipeline to the ports: the registry of
//! loaded artifacts, the prediction service, and the bounded narrative worker.

pub mod narrative_worker;
mod prediction;
mod registry;

pub use narrative_worker::NarrativeWorker;
pub use prediction::{PredictionService, BINARY_POSITIVE_FLOOR};
pub use registry::{ModelRegistry, RegistryStatus};
