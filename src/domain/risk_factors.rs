//! Human-readable risk factors and their explanations.
//!
//! Independent of which prediction path ran. Predicates are evaluated once
//! each, in a fixed priority order: age band, hypertension, heart disease,
//! glucose band, BMI band, smoking status.

use super::patient::{CanonicalPatientRecord, SmokingStatus};

/// Factor labels and explanations for one record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RiskFactorReport {
    /// Ordered, duplicate-free
    pub factors: Vec<String>,
    /// One sentence per factor, then synergy notes
    pub explanation: Vec<String>,
}

impl RiskFactorReport {
    fn push(&mut self, factor: &str, why: String) {
        if !self.factors.iter().any(|f| f == factor) {
            self.factors.push(factor.to_string());
            self.explanation.push(why);
        }
    }
}

/// Message callers show when no factor triggers.
pub const NO_FACTORS_MESSAGE: &str = "No significant risk factors identified";

/// Evaluate every factor predicate against the record.
#[must_use]
pub fn extract(record: &CanonicalPatientRecord) -> RiskFactorReport {
    let mut report = RiskFactorReport::default();
    let age = record.age;

    if age >= 70 {
        report.push(
            "Age 70+",
            format!("Age ({age} years) is a significant factor; stroke risk increases substantially after 70."),
        );
    } else if age >= 60 {
        report.push(
            "Age 60-69",
            format!("Age ({age} years) contributes to elevated risk; cardiovascular vigilance recommended."),
        );
    } else if age >= 50 {
        report.push(
            "Age 50-59",
            format!("Age ({age} years) is entering a period where regular screening becomes important."),
        );
    }

    if record.hypertension {
        report.push(
            "Hypertension",
            "High blood pressure damages blood vessels over time and significantly increases stroke risk.".into(),
        );
    }

    if record.heart_disease {
        report.push(
            "Heart Disease",
            "Heart disease is closely linked to stroke through shared cardiovascular mechanisms.".into(),
        );
    }

    let glucose = record.avg_glucose_level;
    if glucose >= 200.0 {
        report.push(
            "Very High Glucose",
            format!("Glucose level ({glucose} mg/dL) indicates possible diabetes, which damages blood vessels."),
        );
    } else if glucose >= 140.0 {
        report.push(
            "Elevated Glucose",
            format!("Glucose level ({glucose} mg/dL) is elevated; monitoring recommended."),
        );
    }

    let bmi = record.bmi;
    if bmi >= 35.0 {
        report.push(
            "Severe Obesity",
            format!("BMI ({bmi}) indicates severe obesity, which strains the cardiovascular system."),
        );
    } else if bmi >= 30.0 {
        report.push(
            "Obesity",
            format!("BMI ({bmi}) indicates obesity, a modifiable risk factor for stroke."),
        );
    }

    match record.smoking_status {
        SmokingStatus::Smokes => report.push(
            "Current Smoker",
            "Smoking damages blood vessels and significantly increases stroke risk. Quitting has immediate benefits.".into(),
        ),
        SmokingStatus::FormerlySmoked => report.push(
            "Former Smoker",
            "A history of smoking contributes slightly to risk, but quitting was a positive step.".into(),
        ),
        SmokingStatus::NeverSmoked | SmokingStatus::Unknown => {}
    }

    if age >= 60 && record.hypertension {
        report
            .explanation
            .push("The combination of advanced age and hypertension compounds risk.".into());
    }
    if record.hypertension && record.heart_disease {
        report.explanation.push(
            "Having both hypertension and heart disease significantly elevates cardiovascular risk.".into(),
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_factors_yields_empty_list() {
        let record = CanonicalPatientRecord {
            age: 30,
            bmi: 22.0,
            ..Default::default()
        };
        let report = extract(&record);
        assert!(report.factors.is_empty());
        assert!(report.explanation.is_empty());
    }

    #[test]
    fn test_priority_order() {
        let record = CanonicalPatientRecord {
            age: 72,
            hypertension: true,
            heart_disease: true,
            avg_glucose_level: 210.0,
            bmi: 36.0,
            smoking_status: SmokingStatus::Smokes,
            ..Default::default()
        };
        let report = extract(&record);
        assert_eq!(
            report.factors,
            vec![
                "Age 70+",
                "Hypertension",
                "Heart Disease",
                "Very High Glucose",
                "Severe Obesity",
                "Current Smoker"
            ]
        );
        // Six factor sentences plus two synergy notes.
        assert_eq!(report.explanation.len(), 8);
    }

    #[test]
    fn test_one_factor_per_band() {
        let record = CanonicalPatientRecord {
            age: 65,
            avg_glucose_level: 150.0,
            bmi: 28.0,
            smoking_status: SmokingStatus::FormerlySmoked,
            ..Default::default()
        };
        let report = extract(&record);
        assert_eq!(
            report.factors,
            vec!["Age 60-69", "Elevated Glucose", "Former Smoker"]
        );
    }

    #[test]
    fn test_overweight_is_not_a_factor() {
        let record = CanonicalPatientRecord {
            age: 30,
            bmi: 27.0,
            ..Default::default()
        };
        assert!(extract(&record).factors.is_empty());
    }

    #[test]
    fn test_idempotent_and_order_stable() {
        let record = CanonicalPatientRecord {
            age: 55,
            hypertension: true,
            bmi: 31.0,
            ..Default::default()
        };
        assert_eq!(extract(&record), extract(&record));
    }
}
