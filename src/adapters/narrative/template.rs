//! Deterministic narrative built from the record and the risk tier.

use crate::domain::{RiskLevel, SmokingStatus, NO_FACTORS_MESSAGE};
use crate::ports::{NarrativeError, NarrativeRequest, NarrativeSynthesizer};

const LIFESTYLE_TIPS: [&str; 3] = [
    "Aim for 30 minutes of moderate activity most days; even walking counts.",
    "Reduce sodium intake and increase fruits, vegetables, and whole grains.",
    "Manage stress through meditation, deep breathing, or activities you enjoy.",
];

const CLOSING: &str = "Remember: your health journey is unique. Small, consistent steps lead to \
meaningful improvements, and you have the power to positively influence your health outcomes.";

/// Offline narrative used when no remote service is configured or it fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrative;

impl TemplateNarrative {
    /// Render the narrative. Never fails.
    #[must_use]
    pub fn render(request: &NarrativeRequest) -> String {
        let record = &request.record;
        let mut out = String::new();

        out.push_str(match request.result.risk_level {
            RiskLevel::Low => {
                "Great news! Your stroke risk assessment shows a low risk level. This is \
                 encouraging, but maintaining healthy habits is still important."
            }
            RiskLevel::Moderate => {
                "Your assessment shows a moderate risk level. While this isn't cause for alarm, \
                 it's an opportunity to make positive changes for your health."
            }
            RiskLevel::High => {
                "Your assessment indicates an elevated risk level. Please don't be discouraged; \
                 understanding your risk is the first step toward better health."
            }
        });

        let mut recommendations = Vec::new();
        if record.age >= 60 {
            recommendations.push(
                "Regular health check-ups are especially important at your age. Consider \
                 scheduling a comprehensive cardiovascular screening.",
            );
        }
        if record.hypertension {
            recommendations
                .push("Monitor your blood pressure daily. Keep a log to share with your doctor.");
        }
        if record.heart_disease {
            recommendations.push(
                "Stay consistent with any prescribed heart medications. Never skip doses \
                 without consulting your doctor.",
            );
        }
        if record.avg_glucose_level > 140.0 {
            recommendations.push(
                "Your glucose levels suggest monitoring is needed. Consider consulting an \
                 endocrinologist.",
            );
        }
        if record.bmi > 30.0 {
            recommendations.push(
                "Gradual weight management through balanced nutrition can significantly \
                 reduce your risk.",
            );
        }
        if matches!(
            record.smoking_status,
            SmokingStatus::Smokes | SmokingStatus::FormerlySmoked
        ) {
            recommendations.push(
                "If you smoke, quitting is the single most impactful change you can make. \
                 Resources are available to help.",
            );
        }

        out.push_str("\n\nPersonalized Recommendations:\n");
        if recommendations.is_empty() {
            out.push_str("- ");
            out.push_str(NO_FACTORS_MESSAGE);
            out.push_str(". Keep up your current healthy habits.\n");
        }
        for line in recommendations {
            out.push_str("- ");
            out.push_str(line);
            out.push('\n');
        }

        out.push_str("\nLifestyle Tips:\n");
        for tip in LIFESTYLE_TIPS {
            out.push_str("- ");
            out.push_str(tip);
            out.push('\n');
        }

        out.push('\n');
        out.push_str(CLOSING);
        out
    }
}

impl NarrativeSynthesizer for TemplateNarrative {
    fn synthesize(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        Ok(Self::render(request))
    }

    fn name(&self) -> &'static str {
        "template"
    }
}
