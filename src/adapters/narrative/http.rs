//! Remote narrative over an OpenAI-compatible chat-completions API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::domain::NO_FACTORS_MESSAGE;
use crate::ports::{NarrativeError, NarrativeRequest, NarrativeSynthesizer};

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "tngtech/tng-r1t-chimera:free";

const MAX_TOKENS: u32 = 800;
const TEMPERATURE: f32 = 0.7;

const SYSTEM_PROMPT: &str = "You are a caring, knowledgeable healthcare assistant providing \
personalized health guidance. Be warm, supportive, and focus on empowering patients with \
actionable advice.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions client. Without an API key every call fails with
/// [`NarrativeError::NotConfigured`].
pub struct HttpNarrative {
    endpoint: String,
    model: String,
    api_key: Option<Zeroizing<String>>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpNarrative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNarrative")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpNarrative {
    #[must_use]
    pub fn new(
        endpoint: Option<String>,
        model: Option<String>,
        api_key: Option<Zeroizing<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout,
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Patient-profile prompt. Built from the canonical record only.
    #[must_use]
    pub fn build_prompt(request: &NarrativeRequest) -> String {
        let r = &request.record;
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        let factors = if request.result.risk_factors.is_empty() {
            NO_FACTORS_MESSAGE.to_string()
        } else {
            request.result.risk_factors.join(", ")
        };

        format!(
            "A patient has just received their stroke risk assessment.\n\n\
             Patient Profile:\n\
             - Age: {age} years\n\
             - Gender: {gender}\n\
             - Hypertension: {hypertension}\n\
             - Heart Disease: {heart_disease}\n\
             - Average Glucose Level: {glucose} mg/dL\n\
             - BMI: {bmi}\n\
             - Smoking Status: {smoking}\n\
             - Marital Status: {married}\n\
             - Work Type: {work}\n\
             - Residence: {residence}\n\n\
             Assessment Results:\n\
             - Risk Level: {level}\n\
             - Risk Score: {pct}%\n\
             - Key Risk Factors: {factors}\n\n\
             Please provide:\n\
             1. A warm, empathetic opening message (2-3 sentences)\n\
             2. Personalized health recommendations (3-4 bullet points)\n\
             3. Lifestyle modifications specific to their risk factors (2-3 suggestions)\n\
             4. An encouraging closing message\n\n\
             Keep the tone supportive, professional, and hopeful. Avoid medical jargon. \
             Focus on actionable advice.",
            age = r.age,
            gender = r.gender,
            hypertension = yes_no(r.hypertension),
            heart_disease = yes_no(r.heart_disease),
            glucose = r.avg_glucose_level,
            bmi = r.bmi,
            smoking = r.smoking_status,
            married = if r.ever_married { "Married" } else { "Not Married" },
            work = r.work_type,
            residence = r.residence_type,
            level = request.result.risk_level,
            pct = request.result.risk_percentage,
        )
    }
}

impl NarrativeSynthesizer for HttpNarrative {
    fn synthesize(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        let api_key = self.api_key.as_ref().ok_or(NarrativeError::NotConfigured)?;

        let prompt = Self::build_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| NarrativeError::Http(e.to_string()))?;

        let response = client
            .post(&self.endpoint)
            .bearer_auth(api_key.as_str())
            .header("X-Title", "StrokeCare Risk Assessment")
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    NarrativeError::Timeout(self.timeout)
                } else {
                    NarrativeError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NarrativeError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| NarrativeError::Format(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| NarrativeError::Format("response carried no message content".into()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CanonicalPatientRecord, PredictionResult, PredictionSource, SmokingStatus,
    };

    fn request() -> NarrativeRequest {
        NarrativeRequest {
            record: CanonicalPatientRecord {
                age: 65,
                hypertension: true,
                smoking_status: SmokingStatus::FormerlySmoked,
                ..Default::default()
            },
            result: PredictionResult::new(
                47.26,
                None,
                vec!["Age 60-69".into(), "Hypertension".into()],
                PredictionSource::Fallback,
            ),
        }
    }

    #[test]
    fn test_without_key_is_not_configured() {
        let client = HttpNarrative::new(None, None, None, Duration::from_secs(1));
        assert!(!client.is_configured());
        let err = client.synthesize(&request()).expect_err("no key");
        assert!(matches!(err, NarrativeError::NotConfigured));
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let client = HttpNarrative::new(
            None,
            None,
            Some(Zeroizing::new("  ".to_string())),
            Duration::from_secs(1),
        );
        assert!(!client.is_configured());
    }

    #[test]
    fn test_prompt_carries_profile_and_result() {
        let prompt = HttpNarrative::build_prompt(&request());
        assert!(prompt.contains("- Age: 65 years"));
        assert!(prompt.contains("- Hypertension: Yes"));
        assert!(prompt.contains("- Smoking Status: formerly smoked"));
        assert!(prompt.contains("- Risk Level: MODERATE"));
        assert!(prompt.contains("- Risk Score: 47.3%"));
        assert!(prompt.contains("Age 60-69, Hypertension"));
    }

    #[test]
    fn test_prompt_without_factors() {
        let mut req = request();
        req.result.risk_factors.clear();
        let prompt = HttpNarrative::build_prompt(&req);
        assert!(prompt.contains(NO_FACTORS_MESSAGE));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = HttpNarrative::new(
            None,
            None,
            Some(Zeroizing::new("sk-test-secret".to_string())),
            Duration::from_secs(1),
        );
        assert!(!format!("{client:?}").contains("sk-test-secret"));
    }

    #[test]
    fn test_unreachable_endpoint_fails() {
        let client = HttpNarrative::new(
            Some("http://127.0.0.1:9/v1/chat/completions".into()),
            None,
            Some(Zeroizing::new("sk-test".to_string())),
            Duration::from_secs(2),
        );
        assert!(client.synthesize(&request()).is_err());
    }
}
