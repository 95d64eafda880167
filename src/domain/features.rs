//! Feature engineering: canonical record -> ordered model input.
//!
//! Every artifact declares the exact feature names (and order) its scaler and
//! model were fitted on, together with the categorical vocabularies and
//! composite-score coefficients captured at training time. [`engineer`]
//! derives the full set of producible features from a record and then selects
//! exactly the declared ones. A declared feature that cannot be produced is a
//! pipeline/artifact version mismatch and is reported, never zero-filled.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::patient::CanonicalPatientRecord;

/// Declared features could not be produced from the record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Artifact expects features the pipeline cannot produce: {}", .missing.join(", "))]
pub struct FeatureMismatchError {
    pub missing: Vec<String>,
}

/// Categorical fields the pipeline can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalField {
    Gender,
    EverMarried,
    WorkType,
    ResidenceType,
    SmokingStatus,
}

impl CategoricalField {
    pub const ALL: [Self; 5] = [
        Self::Gender,
        Self::EverMarried,
        Self::WorkType,
        Self::ResidenceType,
        Self::SmokingStatus,
    ];

    /// Prefix used for encoded feature names (`<key>_<level>`, `<key>_code`).
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Gender => "gender",
            Self::EverMarried => "ever_married",
            Self::WorkType => "work_type",
            Self::ResidenceType => "residence_type",
            Self::SmokingStatus => "smoking_status",
        }
    }

    fn label(&self, record: &CanonicalPatientRecord) -> &'static str {
        match self {
            Self::Gender => record.gender.as_str(),
            Self::EverMarried => {
                if record.ever_married {
                    "Yes"
                } else {
                    "No"
                }
            }
            Self::WorkType => record.work_type.as_str(),
            Self::ResidenceType => record.residence_type.as_str(),
            Self::SmokingStatus => record.smoking_status.as_str(),
        }
    }

    /// Vocabulary used when an artifact does not declare one.
    fn default_levels(&self) -> &'static [&'static str] {
        match self {
            Self::Gender => &["Male", "Female", "Other"],
            Self::EverMarried => &["No", "Yes"],
            Self::WorkType => &["Private", "Self-employed", "Govt_job", "children", "Never_worked"],
            Self::ResidenceType => &["Urban", "Rural"],
            Self::SmokingStatus => &["never smoked", "formerly smoked", "smokes", "Unknown"],
        }
    }
}

/// Training-time vocabulary for one categorical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    pub levels: Vec<String>,
    /// Level that unseen categories collapse to. Defaults to the first level.
    #[serde(default)]
    pub reference: Option<String>,
}

impl CategoryVocabulary {
    fn resolve<'a>(&'a self, label: &'a str) -> Option<(usize, &'a str)> {
        if let Some(i) = self.levels.iter().position(|l| l == label) {
            return Some((i, label));
        }
        let reference = self.reference.as_deref().or(self.levels.first().map(String::as_str))?;
        let i = self.levels.iter().position(|l| l == reference).unwrap_or(0);
        Some((i, reference))
    }
}

/// Opaque training-time weighted sum over other features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeFeature {
    pub name: String,
    #[serde(default)]
    pub intercept: f64,
    pub weights: BTreeMap<String, f64>,
}

/// Everything an artifact declares about its expected input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContract {
    pub feature_names: Vec<String>,
    /// Keyed by [`CategoricalField::key`].
    #[serde(default)]
    pub encoding: BTreeMap<String, CategoryVocabulary>,
    #[serde(default)]
    pub composites: Vec<CompositeFeature>,
}

/// Ordered, named model input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

/// Age bands as half-open intervals; bands overlap.
pub const AGE_BANDS: [(&str, f64, Option<f64>); 7] = [
    ("age_30_45", 30.0, Some(45.0)),
    ("age_45_60", 45.0, Some(60.0)),
    ("age_60_75", 60.0, Some(75.0)),
    ("age_55_plus", 55.0, None),
    ("age_65_plus", 65.0, None),
    ("age_75_plus", 75.0, None),
    ("age_80_plus", 80.0, None),
];

fn indicator(cond: bool) -> f64 {
    if cond {
        1.0
    } else {
        0.0
    }
}

/// Band membership for one age, in [`AGE_BANDS`] order.
#[must_use]
pub fn age_band_indicators(age: f64) -> Vec<(&'static str, f64)> {
    AGE_BANDS
        .iter()
        .map(|&(name, lo, hi)| {
            let inside = age >= lo && hi.map_or(true, |hi| age < hi);
            (name, indicator(inside))
        })
        .collect()
}

/// All features derivable from the record under this contract's vocabularies.
fn derive_all(
    record: &CanonicalPatientRecord,
    contract: &FeatureContract,
) -> Result<HashMap<String, f64>, FeatureMismatchError> {
    let age = f64::from(record.age);
    let glucose = record.avg_glucose_level;
    let hypertension = indicator(record.hypertension);
    let heart_disease = indicator(record.heart_disease);

    let mut out: HashMap<String, f64> = HashMap::with_capacity(64);
    let mut put = |name: &str, v: f64| {
        out.insert(name.to_string(), v);
    };

    // Raw fields
    put("age", age);
    put("avg_glucose_level", glucose);
    put("bmi", record.bmi);
    put("hypertension", hypertension);
    put("heart_disease", heart_disease);
    put("ever_married", indicator(record.ever_married));

    // Polynomial transforms
    put("age_squared", age * age);
    put("age_cubed", age * age * age);
    put("age_log", (age + 1.0).ln());

    // Interactions
    put("age_x_hypertension", age * hypertension);
    put("age_x_heart_disease", age * heart_disease);
    put("age_x_glucose", age * glucose);

    for (name, v) in age_band_indicators(age) {
        put(name, v);
    }

    for field in CategoricalField::ALL {
        let owned;
        let vocab = match contract.encoding.get(field.key()) {
            Some(v) => v,
            None => {
                owned = CategoryVocabulary {
                    levels: field.default_levels().iter().map(|s| s.to_string()).collect(),
                    reference: None,
                };
                &owned
            }
        };
        let Some((code, resolved)) = vocab.resolve(field.label(record)) else {
            continue;
        };
        put(&format!("{}_code", field.key()), code as f64);
        for level in &vocab.levels {
            put(&format!("{}_{}", field.key(), level), indicator(level == resolved));
        }
    }

    // Composites may build on earlier composites, in declaration order.
    for composite in &contract.composites {
        let mut sum = composite.intercept;
        let mut missing = Vec::new();
        for (term, w) in &composite.weights {
            match out.get(term) {
                Some(v) => sum += w * v,
                None => missing.push(term.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(FeatureMismatchError { missing });
        }
        out.insert(composite.name.clone(), sum);
    }

    Ok(out)
}

/// Build the feature vector declared by `contract`, in its exact order.
///
/// # Errors
/// Returns [`FeatureMismatchError`] listing every declared feature (or
/// composite term) the record cannot produce.
pub fn engineer(
    record: &CanonicalPatientRecord,
    contract: &FeatureContract,
) -> Result<FeatureVector, FeatureMismatchError> {
    let all = derive_all(record, contract)?;

    let mut values = Vec::with_capacity(contract.feature_names.len());
    let mut missing = Vec::new();
    for name in &contract.feature_names {
        match all.get(name) {
            Some(v) => values.push(*v),
            None => missing.push(name.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(FeatureMismatchError { missing });
    }

    Ok(FeatureVector {
        names: contract.feature_names.clone(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patient::{Gender, SmokingStatus, WorkType};

    fn contract(names: &[&str]) -> FeatureContract {
        FeatureContract {
            feature_names: names.iter().map(|s| s.to_string()).collect(),
            encoding: BTreeMap::new(),
            composites: Vec::new(),
        }
    }

    fn band(age: f64, name: &str) -> f64 {
        age_band_indicators(age)
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .expect("known band")
    }

    #[test]
    fn test_overlapping_bands_at_seventy() {
        assert_eq!(band(70.0, "age_60_75"), 1.0);
        assert_eq!(band(70.0, "age_65_plus"), 1.0);
        assert_eq!(band(70.0, "age_55_plus"), 1.0);
        assert_eq!(band(70.0, "age_75_plus"), 0.0);
        assert_eq!(band(70.0, "age_80_plus"), 0.0);
        assert_eq!(band(70.0, "age_45_60"), 0.0);
    }

    #[test]
    fn test_band_edges_are_half_open() {
        assert_eq!(band(30.0, "age_30_45"), 1.0);
        assert_eq!(band(45.0, "age_30_45"), 0.0);
        assert_eq!(band(45.0, "age_45_60"), 1.0);
        assert_eq!(band(75.0, "age_60_75"), 0.0);
        assert_eq!(band(75.0, "age_75_plus"), 1.0);
    }

    #[test]
    fn test_bands_consistent_for_all_ages() {
        for a in 0..120 {
            let age = f64::from(a);
            let b = |n| band(age, n);
            // Open-ended bands nest.
            assert!(b("age_80_plus") <= b("age_75_plus"));
            assert!(b("age_75_plus") <= b("age_65_plus"));
            assert!(b("age_65_plus") <= b("age_55_plus"));
            // Closed bands are disjoint with each other.
            assert!(b("age_30_45") + b("age_45_60") + b("age_60_75") <= 1.0);
            assert_eq!(b("age_55_plus"), indicator(a >= 55));
            assert_eq!(b("age_60_75"), indicator((60..75).contains(&a)));
        }
    }

    #[test]
    fn test_transforms_and_interactions() {
        let record = CanonicalPatientRecord {
            age: 50,
            hypertension: true,
            avg_glucose_level: 120.0,
            ..Default::default()
        };
        let fv = engineer(
            &record,
            &contract(&[
                "age_squared",
                "age_cubed",
                "age_log",
                "age_x_hypertension",
                "age_x_heart_disease",
                "age_x_glucose",
            ]),
        )
        .expect("producible");

        assert_eq!(fv.get("age_squared"), Some(2500.0));
        assert_eq!(fv.get("age_cubed"), Some(125_000.0));
        assert!((fv.get("age_log").unwrap() - 51f64.ln()).abs() < 1e-12);
        assert_eq!(fv.get("age_x_hypertension"), Some(50.0));
        assert_eq!(fv.get("age_x_heart_disease"), Some(0.0));
        assert_eq!(fv.get("age_x_glucose"), Some(6000.0));
    }

    #[test]
    fn test_age_log_at_zero() {
        let fv = engineer(&CanonicalPatientRecord::default(), &contract(&["age_log"]))
            .expect("producible");
        assert_eq!(fv.get("age_log"), Some(0.0));
    }

    #[test]
    fn test_output_follows_declared_order() {
        let names = ["bmi", "age", "hypertension", "gender_Female"];
        let record = CanonicalPatientRecord {
            age: 40,
            gender: Gender::Female,
            bmi: 22.0,
            ..Default::default()
        };
        let fv = engineer(&record, &contract(&names)).expect("producible");
        assert_eq!(fv.names(), &names.map(String::from));
        assert_eq!(fv.values(), &[22.0, 40.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unseen_category_maps_to_reference() {
        let mut c = contract(&["work_type_Private", "work_type_Govt_job", "work_type_code"]);
        c.encoding.insert(
            "work_type".into(),
            CategoryVocabulary {
                levels: vec!["Govt_job".into(), "Private".into()],
                reference: Some("Private".into()),
            },
        );
        let record = CanonicalPatientRecord {
            work_type: WorkType::NeverWorked,
            ..Default::default()
        };
        let fv = engineer(&record, &c).expect("unseen category must not fail");
        assert_eq!(fv.values(), &[1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_composite_uses_artifact_weights() {
        let mut c = contract(&["cardio_score"]);
        c.composites.push(CompositeFeature {
            name: "cardio_score".into(),
            intercept: 1.0,
            weights: BTreeMap::from([
                ("hypertension".to_string(), 2.0),
                ("smoking_status_smokes".to_string(), 3.0),
                ("age_65_plus".to_string(), 0.5),
            ]),
        });
        let record = CanonicalPatientRecord {
            age: 70,
            hypertension: true,
            smoking_status: SmokingStatus::Smokes,
            ..Default::default()
        };
        let fv = engineer(&record, &c).expect("producible");
        assert_eq!(fv.get("cardio_score"), Some(1.0 + 2.0 + 3.0 + 0.5));
    }

    #[test]
    fn test_unknown_feature_is_a_mismatch() {
        let err = engineer(
            &CanonicalPatientRecord::default(),
            &contract(&["age", "cholesterol", "bmi", "waist_circ"]),
        )
        .expect_err("must not zero-fill");
        assert_eq!(err.missing, vec!["cholesterol".to_string(), "waist_circ".to_string()]);
    }

    #[test]
    fn test_composite_with_unknown_term_is_a_mismatch() {
        let mut c = contract(&["score"]);
        c.composites.push(CompositeFeature {
            name: "score".into(),
            intercept: 0.0,
            weights: BTreeMap::from([("ldl".to_string(), 1.0)]),
        });
        let err = engineer(&CanonicalPatientRecord::default(), &c).expect_err("mismatch");
        assert_eq!(err.missing, vec!["ldl".to_string()]);
    }
}
