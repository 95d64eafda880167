//! Canonical patient record and the boundary normalizer.
//!
//! Raw form submissions arrive as loosely typed JSON (numeric strings,
//! checkbox values, free-form category labels). [`normalize`] turns them into
//! a [`CanonicalPatientRecord`] and never fails: every unusable field falls back
//! to a documented default, and each substitution is reported as an
//! [`InputCoercionDefault`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Untyped field name -> raw value mapping, as submitted by a form or API caller.
pub type RawPatientInput = Map<String, Value>;

/// Default age when missing or unparsable.
pub const DEFAULT_AGE: u32 = 0;
/// Default average glucose level (mg/dL).
pub const DEFAULT_GLUCOSE: f64 = 100.0;
/// Default body mass index.
pub const DEFAULT_BMI: f64 = 25.0;
/// Upper bound accepted for age.
pub const MAX_AGE: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Gender {
    #[default]
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkType {
    #[default]
    Private,
    #[serde(rename = "Self-employed")]
    SelfEmployed,
    #[serde(rename = "Govt_job")]
    GovtJob,
    #[serde(rename = "children")]
    Children,
    #[serde(rename = "Never_worked")]
    NeverWorked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResidenceType {
    #[default]
    Urban,
    Rural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SmokingStatus {
    #[default]
    #[serde(rename = "never smoked")]
    NeverSmoked,
    #[serde(rename = "formerly smoked")]
    FormerlySmoked,
    #[serde(rename = "smokes")]
    Smokes,
    #[serde(rename = "Unknown")]
    Unknown,
}

/// Lowercase and collapse separators so "Self employed", "self-employed" and
/// "SELF_EMPLOYED" compare equal.
fn fold_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter_map(|c| match c {
            ' ' | '-' | '_' => None,
            c => Some(c.to_ascii_lowercase()),
        })
        .collect()
}

impl Gender {
    /// Dataset label used by trained artifacts.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl WorkType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "Private",
            Self::SelfEmployed => "Self-employed",
            Self::GovtJob => "Govt_job",
            Self::Children => "children",
            Self::NeverWorked => "Never_worked",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "private" => Some(Self::Private),
            "selfemployed" => Some(Self::SelfEmployed),
            "govtjob" | "government" | "governmentjob" => Some(Self::GovtJob),
            "children" | "child" => Some(Self::Children),
            "neverworked" => Some(Self::NeverWorked),
            _ => None,
        }
    }
}

impl ResidenceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urban => "Urban",
            Self::Rural => "Rural",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "urban" => Some(Self::Urban),
            "rural" => Some(Self::Rural),
            _ => None,
        }
    }
}

impl SmokingStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeverSmoked => "never smoked",
            Self::FormerlySmoked => "formerly smoked",
            Self::Smokes => "smokes",
            Self::Unknown => "Unknown",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "neversmoked" | "never" => Some(Self::NeverSmoked),
            "formerlysmoked" | "former" | "formersmoker" => Some(Self::FormerlySmoked),
            "smokes" | "smoker" | "currentsmoker" | "current" => Some(Self::Smokes),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

macro_rules! impl_display_as_str {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display_as_str!(Gender, WorkType, ResidenceType, SmokingStatus);

/// Fully typed patient input consumed by every downstream component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPatientRecord {
    /// Age in whole years
    pub age: u32,
    pub gender: Gender,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub ever_married: bool,
    pub work_type: WorkType,
    pub residence_type: ResidenceType,
    /// Average glucose level in mg/dL
    pub avg_glucose_level: f64,
    pub bmi: f64,
    pub smoking_status: SmokingStatus,
}

impl Default for CanonicalPatientRecord {
    fn default() -> Self {
        Self {
            age: DEFAULT_AGE,
            gender: Gender::default(),
            hypertension: false,
            heart_disease: false,
            ever_married: false,
            work_type: WorkType::default(),
            residence_type: ResidenceType::default(),
            avg_glucose_level: DEFAULT_GLUCOSE,
            bmi: DEFAULT_BMI,
            smoking_status: SmokingStatus::default(),
        }
    }
}

/// Why a default was substituted for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionReason {
    Missing,
    Unparsable,
    Unrecognized,
    OutOfRange,
}

/// A non-fatal record that the normalizer substituted a value for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputCoercionDefault {
    pub field: &'static str,
    pub reason: CoercionReason,
    /// Value actually used
    pub applied: String,
}

/// Output of [`normalize`]: the record plus every default that was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInput {
    pub record: CanonicalPatientRecord,
    pub defaults: Vec<InputCoercionDefault>,
}

fn lookup<'a>(raw: &'a RawPatientInput, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// Checkbox semantics: absent means unchecked.
fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" | "y" | "1" | "checked" => Some(true),
            "off" | "false" | "no" | "n" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

struct Normalizer<'a> {
    raw: &'a RawPatientInput,
    defaults: Vec<InputCoercionDefault>,
}

impl<'a> Normalizer<'a> {
    fn note(&mut self, field: &'static str, reason: CoercionReason, applied: impl ToString) {
        self.defaults.push(InputCoercionDefault {
            field,
            reason,
            applied: applied.to_string(),
        });
    }

    fn number(&mut self, field: &'static str, keys: &[&str], default: f64) -> f64 {
        match lookup(self.raw, keys) {
            None => {
                self.note(field, CoercionReason::Missing, default);
                default
            }
            Some(v) => match parse_number(v) {
                Some(n) if n >= 0.0 => n,
                Some(_) => {
                    self.note(field, CoercionReason::OutOfRange, default);
                    default
                }
                None => {
                    self.note(field, CoercionReason::Unparsable, default);
                    default
                }
            },
        }
    }

    fn age(&mut self) -> u32 {
        let years = self.number("age", &["age"], f64::from(DEFAULT_AGE));
        let rounded = years.round();
        if rounded > f64::from(MAX_AGE) {
            self.note("age", CoercionReason::OutOfRange, MAX_AGE);
            MAX_AGE
        } else {
            rounded as u32
        }
    }

    fn flag(&mut self, field: &'static str, keys: &[&str]) -> bool {
        match lookup(self.raw, keys) {
            None => false,
            Some(v) => parse_flag(v).unwrap_or_else(|| {
                self.note(field, CoercionReason::Unrecognized, false);
                false
            }),
        }
    }

    fn category<T: Copy + Default + std::fmt::Display>(
        &mut self,
        field: &'static str,
        keys: &[&str],
        parse: fn(&str) -> Option<T>,
    ) -> T {
        let default = T::default();
        match lookup(self.raw, keys) {
            None => {
                self.note(field, CoercionReason::Missing, default);
                default
            }
            Some(Value::String(s)) => parse(s).unwrap_or_else(|| {
                self.note(field, CoercionReason::Unrecognized, default);
                default
            }),
            Some(_) => {
                self.note(field, CoercionReason::Unrecognized, default);
                default
            }
        }
    }
}

/// Map raw, heterogeneous input to a canonical record. Never fails.
#[must_use]
pub fn normalize(raw: &RawPatientInput) -> NormalizedInput {
    let mut n = Normalizer {
        raw,
        defaults: Vec::new(),
    };

    let record = CanonicalPatientRecord {
        age: n.age(),
        gender: n.category("gender", &["gender"], Gender::parse),
        hypertension: n.flag("hypertension", &["hypertension"]),
        heart_disease: n.flag("heart_disease", &["heart_disease"]),
        ever_married: n.flag("ever_married", &["ever_married"]),
        work_type: n.category("work_type", &["work_type"], WorkType::parse),
        residence_type: n.category(
            "residence_type",
            &["residence_type", "Residence_type"],
            ResidenceType::parse,
        ),
        avg_glucose_level: n.number("avg_glucose_level", &["avg_glucose_level"], DEFAULT_GLUCOSE),
        bmi: n.number("bmi", &["bmi"], DEFAULT_BMI),
        smoking_status: n.category("smoking_status", &["smoking_status"], SmokingStatus::parse),
    };

    NormalizedInput {
        record,
        defaults: n.defaults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawPatientInput {
        v.as_object().cloned().expect("object literal")
    }

    #[test]
    fn test_empty_input_yields_documented_defaults() {
        let out = normalize(&RawPatientInput::new());
        let r = &out.record;

        assert_eq!(r.age, 0);
        assert_eq!(r.gender, Gender::Male);
        assert_eq!(r.work_type, WorkType::Private);
        assert_eq!(r.residence_type, ResidenceType::Urban);
        assert!((r.avg_glucose_level - 100.0).abs() < f64::EPSILON);
        assert!((r.bmi - 25.0).abs() < f64::EPSILON);
        assert_eq!(r.smoking_status, SmokingStatus::NeverSmoked);
        assert!(!r.hypertension && !r.heart_disease && !r.ever_married);

        let missing: Vec<_> = out.defaults.iter().map(|d| d.field).collect();
        assert!(missing.contains(&"age"));
        assert!(missing.contains(&"bmi"));
        assert!(out.defaults.iter().all(|d| d.reason == CoercionReason::Missing));
    }

    #[test]
    fn test_form_strings_and_checkboxes() {
        let out = normalize(&raw(json!({
            "age": "67",
            "gender": "female",
            "hypertension": "on",
            "heart_disease": 0,
            "ever_married": "Yes",
            "work_type": "self employed",
            "Residence_type": "Rural",
            "avg_glucose_level": "182.5",
            "bmi": 31.2,
            "smoking_status": "formerly smoked"
        })));
        let r = out.record;

        assert_eq!(r.age, 67);
        assert_eq!(r.gender, Gender::Female);
        assert!(r.hypertension);
        assert!(!r.heart_disease);
        assert!(r.ever_married);
        assert_eq!(r.work_type, WorkType::SelfEmployed);
        assert_eq!(r.residence_type, ResidenceType::Rural);
        assert!((r.avg_glucose_level - 182.5).abs() < 1e-9);
        assert_eq!(r.smoking_status, SmokingStatus::FormerlySmoked);
        assert!(out.defaults.is_empty());
    }

    #[test]
    fn test_garbage_values_fall_back_per_field() {
        let out = normalize(&raw(json!({
            "age": "sixty",
            "gender": "robot",
            "hypertension": "maybe",
            "avg_glucose_level": "NaN",
            "bmi": -4,
            "smoking_status": 3
        })));

        assert_eq!(out.record.age, DEFAULT_AGE);
        assert_eq!(out.record.gender, Gender::Male);
        assert!(!out.record.hypertension);
        assert!((out.record.avg_glucose_level - DEFAULT_GLUCOSE).abs() < f64::EPSILON);
        assert!((out.record.bmi - DEFAULT_BMI).abs() < f64::EPSILON);

        let reason_for = |f: &str| {
            out.defaults
                .iter()
                .find(|d| d.field == f)
                .map(|d| d.reason)
        };
        assert_eq!(reason_for("age"), Some(CoercionReason::Unparsable));
        assert_eq!(reason_for("gender"), Some(CoercionReason::Unrecognized));
        assert_eq!(reason_for("hypertension"), Some(CoercionReason::Unrecognized));
        assert_eq!(reason_for("bmi"), Some(CoercionReason::OutOfRange));
        assert_eq!(reason_for("smoking_status"), Some(CoercionReason::Unrecognized));
    }

    #[test]
    fn test_age_is_rounded_and_capped() {
        assert_eq!(normalize(&raw(json!({"age": 44.6}))).record.age, 45);

        let out = normalize(&raw(json!({"age": 230})));
        assert_eq!(out.record.age, MAX_AGE);
        assert_eq!(out.defaults[0].reason, CoercionReason::OutOfRange);
    }

    #[test]
    fn test_labels_round_trip_through_parse() {
        for w in [
            WorkType::Private,
            WorkType::SelfEmployed,
            WorkType::GovtJob,
            WorkType::Children,
            WorkType::NeverWorked,
        ] {
            assert_eq!(WorkType::parse(w.as_str()), Some(w));
        }
        for s in [
            SmokingStatus::NeverSmoked,
            SmokingStatus::FormerlySmoked,
            SmokingStatus::Smokes,
            SmokingStatus::Unknown,
        ] {
            assert_eq!(SmokingStatus::parse(s.as_str()), Some(s));
        }
    }
}
