//! Environment-driven settings.
//!
//! | Variable | Default |
//! |---|---|
//! | `STROKECARE_MODEL_DIR` | `models` |
//! | `STROKECARE_REQUIRE_SIGNED_ARTIFACTS` | false |
//! | `STROKECARE_ARTIFACT_PUBKEY_B64` / `_FILE` | none |
//! | `STROKECARE_NARRATIVE_ENDPOINT` | OpenRouter chat completions |
//! | `STROKECARE_NARRATIVE_API_KEY` / `_FILE` | none (template narrative) |
//! | `STROKECARE_NARRATIVE_MODEL` | see [`DEFAULT_MODEL`] |
//! | `STROKECARE_NARRATIVE_TIMEOUT_SECS` | 30 |
//! | `STROKECARE_FALLBACK_WEIGHTS_FILE` | built-in weights |
//!
//! Logging variables are read by the binary.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::VerifyingKey;
use zeroize::Zeroizing;

use crate::adapters::artifacts::{verifying_key_from_b64, FsArtifactStore};
use crate::adapters::narrative::{HttpNarrative, DEFAULT_MODEL};
use crate::application::NarrativeWorker;
use crate::domain::{FallbackConfigError, FallbackScorer, FallbackWeights};

pub const DEFAULT_MODEL_DIR: &str = "models";
pub const DEFAULT_NARRATIVE_TIMEOUT_SECS: u64 = 30;

/// Settings could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{var}: failed to read {path}: {source}")]
    Read {
        var: &'static str,
        path: String,
        source: std::io::Error,
    },
}

/// Accepts `1|true|TRUE|yes|YES`; anything else (or unset) is false.
#[must_use]
pub fn parse_bool(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

#[must_use]
pub fn parse_bool_env(name: &str) -> bool {
    parse_bool(std::env::var(name).ok().as_deref())
}

/// Remote narrative settings.
pub struct NarrativeSettings {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<Zeroizing<String>>,
    pub timeout: Duration,
}

impl std::fmt::Debug for NarrativeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug)]
pub struct Settings {
    pub model_dir: PathBuf,
    pub require_signed_artifacts: bool,
    pub artifact_pubkey: Option<VerifyingKey>,
    pub narrative: NarrativeSettings,
    pub fallback_weights_file: Option<PathBuf>,
}

impl Settings {
    /// # Errors
    /// Fails on malformed values or unreadable secret files.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup` instead of the process environment.
    ///
    /// # Errors
    /// Same as [`Settings::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let model_dir = get("STROKECARE_MODEL_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR), PathBuf::from);

        let require_signed_artifacts =
            parse_bool(get("STROKECARE_REQUIRE_SIGNED_ARTIFACTS").as_deref());

        let artifact_pubkey = secret(
            &get,
            "STROKECARE_ARTIFACT_PUBKEY_B64",
            "STROKECARE_ARTIFACT_PUBKEY_B64_FILE",
        )?
        .map(|b64| {
            verifying_key_from_b64(&b64).map_err(|reason| ConfigError::Invalid {
                var: "STROKECARE_ARTIFACT_PUBKEY_B64",
                reason,
            })
        })
        .transpose()?;

        let timeout_secs = match get("STROKECARE_NARRATIVE_TIMEOUT_SECS") {
            None => DEFAULT_NARRATIVE_TIMEOUT_SECS,
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|&s| s > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    var: "STROKECARE_NARRATIVE_TIMEOUT_SECS",
                    reason: format!("expected a positive integer, got '{v}'"),
                })?,
        };

        let narrative = NarrativeSettings {
            endpoint: get("STROKECARE_NARRATIVE_ENDPOINT"),
            model: get("STROKECARE_NARRATIVE_MODEL"),
            api_key: secret(
                &get,
                "STROKECARE_NARRATIVE_API_KEY",
                "STROKECARE_NARRATIVE_API_KEY_FILE",
            )?,
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            model_dir,
            require_signed_artifacts,
            artifact_pubkey,
            narrative,
            fallback_weights_file: get("STROKECARE_FALLBACK_WEIGHTS_FILE").map(PathBuf::from),
        })
    }

    /// Artifact store for the configured directory and signature policy.
    #[must_use]
    pub fn artifact_store(&self) -> FsArtifactStore {
        let store = FsArtifactStore::new(&self.model_dir)
            .require_signature(self.require_signed_artifacts);
        match self.artifact_pubkey {
            Some(key) => store.with_verifying_key(key),
            None => store,
        }
    }

    /// Fallback scorer from the configured weights file, or the built-in weights.
    ///
    /// # Errors
    /// An unreadable or invalid weights file.
    pub fn fallback_scorer(&self) -> Result<FallbackScorer, FallbackConfigError> {
        let Some(path) = &self.fallback_weights_file else {
            return Ok(FallbackScorer::default());
        };
        let bytes = fs::read(path).map_err(|e| {
            FallbackConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        FallbackScorer::new(FallbackWeights::from_json(&bytes)?)
    }

    /// Background remote narrative, when an API key is configured.
    #[must_use]
    pub fn narrative_worker(&self) -> Option<NarrativeWorker> {
        let n = &self.narrative;
        let client = HttpNarrative::new(
            n.endpoint.clone(),
            n.model.clone(),
            n.api_key.clone(),
            n.timeout,
        );
        if !client.is_configured() {
            tracing::info!("No narrative API key configured; using template narrative");
            return None;
        }
        tracing::info!(
            "Remote narrative enabled (model={})",
            n.model.as_deref().unwrap_or(DEFAULT_MODEL)
        );
        // The worker waits slightly longer than the HTTP client so the client's
        // own timeout error is reported when it fires first.
        Some(NarrativeWorker::new(
            Arc::new(client),
            n.timeout + Duration::from_secs(1),
        ))
    }
}

/// Value of `var`, or the trimmed contents of the file named by `file_var`.
fn secret(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    file_var: &'static str,
) -> Result<Option<Zeroizing<String>>, ConfigError> {
    if let Some(path) = get(file_var) {
        let content = fs::read_to_string(path.trim()).map_err(|source| ConfigError::Read {
            var: file_var,
            path: path.clone(),
            source,
        })?;
        let value = content.trim_end_matches(['\n', '\r']).to_string();
        return Ok((!value.is_empty()).then(|| Zeroizing::new(value)));
    }
    Ok(get(var).map(|v| Zeroizing::new(v.trim().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_parse_bool() {
        for v in ["1", "true", "TRUE", "yes", "YES"] {
            assert!(parse_bool(Some(v)));
        }
        assert!(!parse_bool(Some("on")));
        assert!(!parse_bool(None));
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).expect("defaults");
        assert_eq!(s.model_dir, PathBuf::from("models"));
        assert!(!s.require_signed_artifacts);
        assert!(s.artifact_pubkey.is_none());
        assert!(s.narrative.api_key.is_none());
        assert_eq!(s.narrative.timeout, Duration::from_secs(30));
        assert!(s.narrative_worker().is_none());
        assert!(s.fallback_scorer().is_ok());
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let err = settings(&[("STROKECARE_NARRATIVE_TIMEOUT_SECS", "soon")]).expect_err("bad");
        assert!(err.to_string().contains("STROKECARE_NARRATIVE_TIMEOUT_SECS"));
    }

    #[test]
    fn test_rejects_bad_pubkey() {
        assert!(settings(&[("STROKECARE_ARTIFACT_PUBKEY_B64", "not-a-key")]).is_err());
    }

    #[test]
    fn test_pubkey_and_api_key_from_files() {
        let temp = tempdir().expect("tempdir");
        let key = ed25519_dalek::SigningKey::from_bytes(&[3u8; 32]).verifying_key();
        let key_path = temp.path().join("pub.b64");
        fs::write(
            &key_path,
            base64::engine::general_purpose::STANDARD.encode(key.to_bytes()) + "\n",
        )
        .expect("write key");
        let api_path = temp.path().join("api");
        fs::write(&api_path, "sk-test-value\n").expect("write api key");

        let s = settings(&[
            ("STROKECARE_ARTIFACT_PUBKEY_B64_FILE", key_path.to_str().expect("utf8")),
            ("STROKECARE_NARRATIVE_API_KEY_FILE", api_path.to_str().expect("utf8")),
        ])
        .expect("settings");
        assert_eq!(s.artifact_pubkey, Some(key));
        assert_eq!(s.narrative.api_key.as_deref().map(String::as_str), Some("sk-test-value"));
        assert!(s.narrative_worker().is_some());
    }

    #[test]
    fn test_invalid_weights_file_is_reported() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("weights.json");
        fs::write(&path, r#"{"floor": 50, "ceiling": 10}"#).expect("write");

        let s = settings(&[("STROKECARE_FALLBACK_WEIGHTS_FILE", path.to_str().expect("utf8"))])
            .expect("settings");
        assert!(s.fallback_scorer().is_err());
    }
}
