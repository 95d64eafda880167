//! # StrokeCare
//!
//! Stroke risk assessment from ten structured clinical and lifestyle inputs.
//!
//! This crate provides:
//! - Normalization of loosely-typed form input into a canonical record
//! - Feature engineering against each trained artifact's declared contract
//! - Binary and probability predictors, with a deterministic rule-based fallback
//! - Risk tiers, named risk factors and narrative guidance
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types and pure pipeline logic
//! - `ports`: Trait definitions for artifact storage and narrative generation
//! - `adapters`: Filesystem artifacts, chat-completions client, log sanitizing
//! - `application`: Model registry and prediction service
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{ModelRegistry, PredictionService, RegistryStatus};
pub use domain::{Assessment, CanonicalPatientRecord, PredictionResult, PredictionSource, RiskLevel};

/// Result type for StrokeCare operations
pub type Result<T> = std::result::Result<T, StrokeCareError>;

/// Main error type for StrokeCare
#[derive(Debug, thiserror::Error)]
pub enum StrokeCareError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] domain::ArtifactLoadError),

    #[error("Fallback scorer error: {0}")]
    Fallback(#[from] domain::FallbackConfigError),

    #[error(transparent)]
    FeatureMismatch(#[from] domain::FeatureMismatchError),

    #[error("Narrative error: {0}")]
    Narrative(#[from] ports::NarrativeError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
