//! Prediction service: the stroke-risk pipeline.
//!
//! raw input -> normalize -> {engineer + predictors} or {fallback scorer}
//! -> risk factors -> narrative -> [`Assessment`].
//!
//! Path selection is an ordered capability check, evaluated per artifact:
//! the artifact must be loaded, its features must be producible from the
//! record, and evaluation must succeed. An artifact failing any step is
//! treated as absent for this request only.

use std::sync::Arc;

use crate::adapters::narrative::TemplateNarrative;
use crate::application::{ModelRegistry, NarrativeWorker};
use crate::domain::{
    engineer, extract_risk_factors, normalize, Assessment, CanonicalPatientRecord,
    FallbackConfigError, FallbackScorer, FeatureVector, PredictionResult, PredictionSource,
    PredictorArtifact, RawPatientInput,
};
use crate::ports::NarrativeRequest;

/// Lowest percentage reported when both predictors ran and the binary one
/// flagged the patient.
pub const BINARY_POSITIVE_FLOOR: f64 = 30.0;

/// Runs predictions against a shared, immutable [`ModelRegistry`].
///
/// `Send + Sync`; one instance serves concurrent requests.
#[derive(Debug)]
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
    fallback: Result<FallbackScorer, FallbackConfigError>,
    narrative: Option<NarrativeWorker>,
}

impl PredictionService {
    /// Service with the default fallback weights and the template narrative.
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            fallback: Ok(FallbackScorer::default()),
            narrative: None,
        }
    }

    /// Replace the fallback scorer. An error here leaves the service running;
    /// requests with no usable predictor then report [`PredictionSource::Unavailable`].
    #[must_use]
    pub fn with_fallback(mut self, fallback: Result<FallbackScorer, FallbackConfigError>) -> Self {
        if let Err(e) = &fallback {
            tracing::error!("Fallback scorer misconfigured: {e}");
        }
        self.fallback = fallback;
        self
    }

    /// Use a background narrative synthesizer before the template.
    #[must_use]
    pub fn with_narrative(mut self, worker: NarrativeWorker) -> Self {
        self.narrative = Some(worker);
        self
    }

    /// Full pipeline for untyped input. Never fails.
    #[must_use]
    pub fn assess(&self, raw: &RawPatientInput) -> Assessment {
        let normalized = normalize(raw);
        for d in &normalized.defaults {
            tracing::debug!(
                "Input field '{}' defaulted to {} ({:?})",
                d.field,
                d.applied,
                d.reason
            );
        }
        if !normalized.defaults.is_empty() {
            tracing::info!("{} input field(s) defaulted", normalized.defaults.len());
        }

        let record = normalized.record;
        let result = self.predict(&record);
        let explanation = extract_risk_factors(&record).explanation;

        let request = NarrativeRequest { record, result };
        let ai_insights = self.narrative_for(&request);

        Assessment::new(request.result, explanation, ai_insights, normalized.defaults)
    }

    /// Quantitative result for a canonical record. Never fails.
    #[must_use]
    pub fn predict(&self, record: &CanonicalPatientRecord) -> PredictionResult {
        let risk_factors = extract_risk_factors(record).factors;

        let probability = self
            .registry
            .probability()
            .and_then(|artifact| run_artifact(artifact, record, PredictorArtifact::predict_probability));
        let binary = self
            .registry
            .binary()
            .and_then(|artifact| run_artifact(artifact, record, PredictorArtifact::predict_class));

        let result = match (probability, binary) {
            (Some(p), Some(b)) => {
                let mut pct = p * 100.0;
                if b == 1 {
                    pct = pct.max(BINARY_POSITIVE_FLOOR);
                }
                PredictionResult::new(pct, Some(b), risk_factors, PredictionSource::ModelBoth)
            }
            (Some(p), None) => {
                PredictionResult::new(p * 100.0, None, risk_factors, PredictionSource::ModelPartial)
            }
            // Only the classifier ran: the percentage comes from the rule-based scorer.
            (None, Some(b)) => match &self.fallback {
                Ok(scorer) => PredictionResult::new(
                    scorer.score(record),
                    Some(b),
                    risk_factors,
                    PredictionSource::ModelPartial,
                ),
                Err(e) => {
                    tracing::error!("No percentage available for binary-only result: {e}");
                    PredictionResult::new(0.0, Some(b), risk_factors, PredictionSource::Unavailable)
                }
            },
            (None, None) => match &self.fallback {
                Ok(scorer) => {
                    tracing::warn!("No usable predictor; using rule-based fallback");
                    PredictionResult::new(
                        scorer.score(record),
                        None,
                        risk_factors,
                        PredictionSource::Fallback,
                    )
                }
                Err(e) => {
                    tracing::error!("No usable predictor and fallback unavailable: {e}");
                    PredictionResult::new(0.0, None, risk_factors, PredictionSource::Unavailable)
                }
            },
        };

        tracing::info!(
            "Prediction complete: source={:?} level={} factors={}",
            result.source,
            result.risk_level,
            result.risk_factors.len()
        );
        result
    }

    fn narrative_for(&self, request: &NarrativeRequest) -> String {
        if let Some(worker) = &self.narrative {
            match worker.run(request.clone()) {
                Ok(text) => return text,
                Err(e) => tracing::warn!("Narrative unavailable, using template: {e}"),
            }
        }
        TemplateNarrative::render(request)
    }
}

/// Engineer features for `artifact` and evaluate it. `None` marks the path
/// unusable for this request.
fn run_artifact<T>(
    artifact: &PredictorArtifact,
    record: &CanonicalPatientRecord,
    eval: impl Fn(&PredictorArtifact, &FeatureVector) -> Result<T, String>,
) -> Option<T> {
    let features = match engineer(record, &artifact.contract) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("{} artifact skipped: {e}", artifact.kind);
            return None;
        }
    };
    tracing::debug!("{} features engineered (n={})", artifact.kind, features.len());

    match eval(artifact, &features) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{} artifact evaluation failed: {e}", artifact.kind);
            None
        }
    }
}
