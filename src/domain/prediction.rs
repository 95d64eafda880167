//! Prediction result types.
//!
//! Represents the quantitative output of the stroke risk pipeline and the
//! final assessment handed back to callers.

use serde::{Deserialize, Serialize};

use super::patient::InputCoercionDefault;

/// Lower bound (inclusive) of the MODERATE tier, in percent.
pub const MODERATE_THRESHOLD: f64 = 30.0;
/// Lower bound (inclusive) of the HIGH tier, in percent.
pub const HIGH_THRESHOLD: f64 = 60.0;

/// Risk tier derived from the risk percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Below 30%
    Low,
    /// 30% up to (excluding) 60%
    Moderate,
    /// 60% and above
    High,
}

impl RiskLevel {
    /// Classify a risk percentage. Bands are closed below, open above.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= HIGH_THRESHOLD {
            Self::High
        } else if percentage >= MODERATE_THRESHOLD {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Which path produced the risk percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionSource {
    /// Both trained predictors ran.
    ModelBoth,
    /// Exactly one trained predictor ran. When only the binary predictor ran,
    /// `binary_prediction` is model output but the percentage comes from the
    /// rule-based scorer.
    ModelPartial,
    /// No predictor was usable; the rule-based scorer ran.
    Fallback,
    /// No predictor was usable and the rule-based scorer is misconfigured.
    /// The percentage and tier carry no information.
    Unavailable,
}

impl PredictionSource {
    #[must_use]
    pub fn is_model(&self) -> bool {
        matches!(self, Self::ModelBoth | Self::ModelPartial)
    }
}

/// Round half away from zero to one decimal place.
#[must_use]
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Quantitative outcome of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Risk percentage in [0, 100], one decimal place
    pub risk_percentage: f64,
    pub risk_level: RiskLevel,
    /// Present only when the binary predictor ran
    pub binary_prediction: Option<u8>,
    /// Ordered, duplicate-free
    pub risk_factors: Vec<String>,
    pub source: PredictionSource,
}

impl PredictionResult {
    /// Build a result, clamping and rounding the percentage and deriving the tier.
    #[must_use]
    pub fn new(
        risk_percentage: f64,
        binary_prediction: Option<u8>,
        risk_factors: Vec<String>,
        source: PredictionSource,
    ) -> Self {
        let pct = if risk_percentage.is_finite() {
            round_one_decimal(risk_percentage.clamp(0.0, 100.0))
        } else {
            0.0
        };
        Self {
            risk_percentage: pct,
            risk_level: RiskLevel::from_percentage(pct),
            binary_prediction,
            risk_factors,
            source,
        }
    }
}

/// Complete assessment returned to callers, including narrative guidance.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    /// Unique identifier
    pub id: String,

    #[serde(flatten)]
    pub result: PredictionResult,

    /// One explanatory sentence per triggered factor
    pub explanation: Vec<String>,

    /// Narrative guidance (remote or template)
    pub ai_insights: String,

    /// Defaults the normalizer substituted for unusable input fields
    pub input_defaults: Vec<InputCoercionDefault>,

    /// Timestamp of assessment
    pub assessed_at: chrono::DateTime<chrono::Utc>,
}

impl Assessment {
    #[must_use]
    pub fn new(
        result: PredictionResult,
        explanation: Vec<String>,
        ai_insights: String,
        input_defaults: Vec<InputCoercionDefault>,
    ) -> Self {
        Self {
            id: uuid_v4(),
            result,
            explanation,
            ai_insights,
            input_defaults,
            assessed_at: chrono::Utc::now(),
        }
    }
}

/// Generate a random UUID v4 using a CSPRNG seeded from OS entropy.
fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
