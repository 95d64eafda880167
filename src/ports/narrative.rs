//! Narrative port: free-text guidance generated from a finished prediction.

use crate::domain::{CanonicalPatientRecord, PredictionResult};

/// Errors from a narrative synthesizer. Never fatal to the prediction.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("Narrative service not configured")]
    NotConfigured,

    #[error("Narrative request failed: {0}")]
    Http(String),

    #[error("Narrative service returned status {0}")]
    Status(u16),

    #[error("Narrative response malformed: {0}")]
    Format(String),

    #[error("Narrative service timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Input handed to a synthesizer: the quantitative result (without narrative)
/// and the canonical record it was computed from.
#[derive(Debug, Clone)]
pub struct NarrativeRequest {
    pub record: CanonicalPatientRecord,
    pub result: PredictionResult,
}

/// Produces narrative guidance, or fails.
pub trait NarrativeSynthesizer: Send + Sync {
    /// # Errors
    /// Any failure; callers degrade to a placeholder narrative.
    fn synthesize(&self, request: &NarrativeRequest) -> Result<String, NarrativeError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
