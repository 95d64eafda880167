//! Domain layer: Core types and pure pipeline logic.
//!
//! Nothing in this module performs I/O. Normalization, feature engineering,
//! model evaluation, fallback scoring and factor extraction are all pure
//! functions of their inputs.

pub mod artifact;
pub mod fallback;
pub mod features;
pub mod patient;
mod prediction;
pub mod risk_factors;

pub use artifact::{ArtifactKind, ArtifactLoadError, PredictorArtifact};
pub use fallback::{FallbackConfigError, FallbackScorer, FallbackWeights};
pub use features::{engineer, FeatureContract, FeatureMismatchError, FeatureVector};
pub use patient::{
    normalize, CanonicalPatientRecord, Gender, InputCoercionDefault, NormalizedInput,
    RawPatientInput, ResidenceType, SmokingStatus, WorkType,
};
pub use prediction::{
    round_one_decimal, Assessment, PredictionResult, PredictionSource, RiskLevel,
};
pub use risk_factors::{extract as extract_risk_factors, RiskFactorReport, NO_FACTORS_MESSAGE};
