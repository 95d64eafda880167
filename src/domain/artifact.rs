//! Trained predictor artifacts.
//!
//! An artifact bundles a fitted scaler, a trained model and the feature
//! contract both were fitted on. Artifacts are exported by the training
//! pipeline as JSON, validated once at load time and never mutated afterwards.

use serde::{Deserialize, Serialize};

use super::features::{FeatureContract, FeatureVector};

/// Artifact format version understood by this build.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Which predictor an artifact implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Class label in {0, 1}
    Binary,
    /// Probability in [0, 1]
    Probability,
}

impl ArtifactKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Probability => "probability",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while loading one artifact. Fatal for that artifact only.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactLoadError {
    #[error("{kind} artifact not found at {path}")]
    NotFound { kind: ArtifactKind, path: String },

    #[error("{kind} artifact unreadable: {source}")]
    Io {
        kind: ArtifactKind,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} artifact is not valid JSON: {source}")]
    Format {
        kind: ArtifactKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} artifact is invalid: {reason}")]
    Invalid { kind: ArtifactKind, reason: String },

    #[error("{kind} artifact failed signature verification: {reason}")]
    Signature { kind: ArtifactKind, reason: String },
}

/// Per-feature standardization: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Zero scale (constant feature at fit time) is treated as 1.
    #[must_use]
    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(v, (m, s))| {
                let s = if *s == 0.0 { 1.0 } else { *s };
                (v - m) / s
            })
            .collect()
    }
}

/// How tree outputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Boosted ensembles
    #[default]
    Sum,
    /// Bagged ensembles (random forests)
    Mean,
}

/// Transform applied to the aggregated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    #[default]
    Logistic,
    Identity,
}

/// Flat-array tree node. Go left when `x[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Node 0 is the root.
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        // Validated trees are acyclic with in-range children, so this terminates
        // within `nodes.len()` steps; the bound guards malformed input anyway.
        for _ in 0..=self.nodes.len() {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
        0.0
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(format!("node {i}: non-finite leaf value"));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {i}: feature index {feature} out of range"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {i}: NaN threshold"));
                    }
                    // Children must point forward; this rules out cycles.
                    if *left <= i || *right <= i {
                        return Err(format!("node {i}: children must follow their parent"));
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(format!("node {i}: child index out of range"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Trained model families exported by the training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainedModel {
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    TreeEnsemble {
        trees: Vec<DecisionTree>,
        #[serde(default)]
        base_score: f64,
        #[serde(default)]
        aggregation: Aggregation,
        #[serde(default)]
        link: Link,
    },
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl TrainedModel {
    /// Positive-class probability for an already scaled input.
    fn positive_probability(&self, x: &[f64]) -> f64 {
        match self {
            Self::Logistic {
                coefficients,
                intercept,
            } => {
                let z: f64 = coefficients.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + intercept;
                sigmoid(z)
            }
            Self::TreeEnsemble {
                trees,
                base_score,
                aggregation,
                link,
            } => {
                let total: f64 = trees.iter().map(|t| t.evaluate(x)).sum();
                let score = match aggregation {
                    Aggregation::Sum => base_score + total,
                    Aggregation::Mean if trees.is_empty() => *base_score,
                    Aggregation::Mean => base_score + total / trees.len() as f64,
                };
                match link {
                    Link::Logistic => sigmoid(score),
                    Link::Identity => score,
                }
            }
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        match self {
            Self::Logistic {
                coefficients,
                intercept,
            } => {
                if coefficients.len() != n_features {
                    return Err(format!(
                        "coefficient count {} does not match feature count {n_features}",
                        coefficients.len()
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("non-finite coefficient".into());
                }
            }
            Self::TreeEnsemble { trees, .. } => {
                if trees.is_empty() {
                    return Err("tree ensemble has no trees".into());
                }
                for (t, tree) in trees.iter().enumerate() {
                    tree.validate(n_features).map_err(|e| format!("tree {t}: {e}"))?;
                }
            }
        }
        Ok(())
    }
}

fn default_threshold() -> f64 {
    0.5
}

/// Immutable bundle of {trained model, fitted scaler, feature contract}.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorArtifact {
    pub version: u32,
    pub kind: ArtifactKind,
    #[serde(flatten)]
    pub contract: FeatureContract,
    pub scaler: StandardScaler,
    pub model: TrainedModel,
    /// Decision threshold for binary artifacts.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl PredictorArtifact {
    /// Parse and validate an exported artifact.
    ///
    /// # Errors
    /// Returns `Format` for malformed JSON and `Invalid` for bundles whose
    /// parts disagree with each other or with `expected`.
    pub fn from_json(expected: ArtifactKind, bytes: &[u8]) -> Result<Self, ArtifactLoadError> {
        let artifact: Self = serde_json::from_slice(bytes).map_err(|source| {
            ArtifactLoadError::Format {
                kind: expected,
                source,
            }
        })?;
        if artifact.kind != expected {
            return Err(ArtifactLoadError::Invalid {
                kind: expected,
                reason: format!("bundle declares kind {}", artifact.kind),
            });
        }
        artifact.validate().map_err(|reason| ArtifactLoadError::Invalid {
            kind: expected,
            reason,
        })?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), String> {
        if self.version != ARTIFACT_FORMAT_VERSION {
            return Err(format!("unsupported artifact version {}", self.version));
        }
        let n = self.contract.feature_names.len();
        if n == 0 {
            return Err("feature_names is empty".into());
        }
        let mut seen = std::collections::HashSet::with_capacity(n);
        if let Some(dup) = self.contract.feature_names.iter().find(|f| !seen.insert(*f)) {
            return Err(format!("duplicate feature name {dup}"));
        }
        if self.scaler.mean.len() != n || self.scaler.scale.len() != n {
            return Err(format!(
                "scaler expects {}/{} features, contract declares {n}",
                self.scaler.mean.len(),
                self.scaler.scale.len()
            ));
        }
        if self
            .scaler
            .mean
            .iter()
            .chain(&self.scaler.scale)
            .any(|v| !v.is_finite())
        {
            return Err("non-finite scaler parameter".into());
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold {} outside [0, 1]", self.threshold));
        }
        self.model.validate(n)
    }

    fn scaled(&self, features: &FeatureVector) -> Result<Vec<f64>, String> {
        if features.names() != self.contract.feature_names.as_slice() {
            return Err("feature vector was not built for this artifact".into());
        }
        Ok(self.scaler.transform(features.values()))
    }

    /// Positive-class probability clamped to [0, 1].
    ///
    /// # Errors
    /// Fails if the vector was engineered for a different contract or the
    /// model produced a non-finite value.
    pub fn predict_probability(&self, features: &FeatureVector) -> Result<f64, String> {
        let x = self.scaled(features)?;
        let p = self.model.positive_probability(&x);
        if !p.is_finite() {
            return Err("model produced a non-finite probability".into());
        }
        Ok(p.clamp(0.0, 1.0))
    }

    /// Class label in {0, 1} using this artifact's decision threshold.
    ///
    /// # Errors
    /// Same conditions as [`Self::predict_probability`].
    pub fn predict_class(&self, features: &FeatureVector) -> Result<u8, String> {
        let p = self.predict_probability(features)?;
        Ok(u8::from(p >= self.threshold))
    }
}
