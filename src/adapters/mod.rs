//! Adapters layer: Concrete implementations of ports.
//!
//! - `artifacts`: predictor bundles on disk, with optional signed manifest
//! - `narrative`: chat-completions client and template narrative
//! - `sanitize`: secret filtering for logs

pub mod artifacts;
pub mod narrative;
pub mod sanitize;

pub use artifacts::FsArtifactStore;
pub use narrative::{HttpNarrative, TemplateNarrative};
