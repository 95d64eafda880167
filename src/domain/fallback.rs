//! Deterministic rule-based risk scorer.
//!
//! Used when no trained predictor can produce a probability. The score is a
//! baseline plus fixed contributions for age, blood pressure, heart disease,
//! glucose, BMI, smoking and two synergy terms, clamped into `[floor, ceiling]`.
//! This path never yields a binary prediction.

use serde::{Deserialize, Serialize};

use super::patient::{CanonicalPatientRecord, SmokingStatus};

/// Fallback weights failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid fallback weights: {0}")]
pub struct FallbackConfigError(pub String);

/// A `>= at` threshold with its contribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub at: f64,
    pub points: f64,
}

const fn step(at: f64, points: f64) -> Step {
    Step { at, points }
}

/// Points for the highest step reached. Steps are sorted descending by `at`.
fn stepped(value: f64, steps: &[Step]) -> f64 {
    steps
        .iter()
        .find(|s| value >= s.at)
        .map_or(0.0, |s| s.points)
}

/// Scorer weights. Overridable from JSON; see [`FallbackWeights::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackWeights {
    pub baseline: f64,
    pub age: Vec<Step>,
    pub hypertension: f64,
    pub heart_disease: f64,
    pub glucose: Vec<Step>,
    pub bmi: Vec<Step>,
    pub current_smoker: f64,
    pub former_smoker: f64,
    /// Age >= `elderly_age` together with hypertension
    pub elderly_hypertension: f64,
    pub elderly_age: f64,
    /// Hypertension together with heart disease
    pub hypertension_heart_disease: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for FallbackWeights {
    fn default() -> Self {
        Self {
            baseline: 0.0,
            age: vec![step(70.0, 35.0), step(60.0, 25.0), step(50.0, 15.0), step(40.0, 5.0)],
            hypertension: 20.0,
            heart_disease: 20.0,
            glucose: vec![step(200.0, 15.0), step(140.0, 10.0), step(100.0, 5.0)],
            bmi: vec![step(35.0, 10.0), step(30.0, 7.0), step(25.0, 3.0)],
            current_smoker: 15.0,
            former_smoker: 5.0,
            elderly_hypertension: 10.0,
            elderly_age: 60.0,
            hypertension_heart_disease: 10.0,
            floor: 5.0,
            ceiling: 95.0,
        }
    }
}

impl FallbackWeights {
    /// Parse weights from JSON; unspecified fields keep their defaults.
    ///
    /// # Errors
    /// Returns an error for malformed JSON or weights that fail validation.
    pub fn from_json(bytes: &[u8]) -> Result<Self, FallbackConfigError> {
        let mut weights: Self = serde_json::from_slice(bytes)
            .map_err(|e| FallbackConfigError(format!("malformed weights: {e}")))?;
        weights.sort_steps();
        weights.validate()?;
        Ok(weights)
    }

    /// Order every step table by descending threshold.
    fn sort_steps(&mut self) {
        for steps in [&mut self.age, &mut self.glucose, &mut self.bmi] {
            steps.sort_by(|a, b| b.at.total_cmp(&a.at));
        }
    }

    /// # Errors
    /// Fails on non-finite values or bounds outside `0 <= floor <= ceiling <= 100`.
    pub fn validate(&self) -> Result<(), FallbackConfigError> {
        let scalars = [
            self.baseline,
            self.hypertension,
            self.heart_disease,
            self.current_smoker,
            self.former_smoker,
            self.elderly_hypertension,
            self.elderly_age,
            self.hypertension_heart_disease,
            self.floor,
            self.ceiling,
        ];
        let steps = self.age.iter().chain(&self.glucose).chain(&self.bmi);
        if scalars.iter().any(|v| !v.is_finite())
            || steps.clone().any(|s| !s.at.is_finite() || !s.points.is_finite())
        {
            return Err(FallbackConfigError("non-finite weight".into()));
        }
        if !(0.0 <= self.floor && self.floor <= self.ceiling && self.ceiling <= 100.0) {
            return Err(FallbackConfigError(format!(
                "bounds must satisfy 0 <= floor ({}) <= ceiling ({}) <= 100",
                self.floor, self.ceiling
            )));
        }
        Ok(())
    }
}

/// Validated rule-based scorer.
#[derive(Debug, Clone)]
pub struct FallbackScorer {
    weights: FallbackWeights,
}

impl Default for FallbackScorer {
    fn default() -> Self {
        Self {
            weights: FallbackWeights::default(),
        }
    }
}

impl FallbackScorer {
    /// # Errors
    /// Returns an error if the weights fail validation.
    pub fn new(mut weights: FallbackWeights) -> Result<Self, FallbackConfigError> {
        weights.validate()?;
        weights.sort_steps();
        Ok(Self { weights })
    }

    /// Risk percentage for a record, always within `[floor, ceiling]`.
    #[must_use]
    pub fn score(&self, record: &CanonicalPatientRecord) -> f64 {
        let w = &self.weights;
        let age = f64::from(record.age);

        let mut score = w.baseline;
        score += stepped(age, &w.age);
        if record.hypertension {
            score += w.hypertension;
        }
        if record.heart_disease {
            score += w.heart_disease;
        }
        score += stepped(record.avg_glucose_level, &w.glucose);
        score += stepped(record.bmi, &w.bmi);
        score += match record.smoking_status {
            SmokingStatus::Smokes => w.current_smoker,
            SmokingStatus::FormerlySmoked => w.former_smoker,
            SmokingStatus::NeverSmoked | SmokingStatus::Unknown => 0.0,
        };

        if age >= w.elderly_age && record.hypertension {
            score += w.elderly_hypertension;
        }
        if record.hypertension && record.heart_disease {
            score += w.hypertension_heart_disease;
        }

        score.clamp(w.floor, w.ceiling)
    }
}
