//! Filesystem artifact store: implementation of `ArtifactStore`.
//!
//! Loads the two predictor bundles exported by the training pipeline from a
//! single directory:
//!
//! - `stroke_binary_model.json`
//! - `stroke_probability_model.json`
//!
//! # Signed manifests
//!
//! The directory may carry a `manifest.json` listing the SHA-256 of each
//! bundle, plus `artifacts.sig`, an Ed25519 signature over the manifest bytes
//! (produced by the `sign_artifacts` tool). When a manifest is present it is
//! always verified, and every bundle loaded must be bound by it. When
//! `require_signature` is set, a directory without a manifest is rejected.
//!
//! Each bundle is checked independently, so a tampered or missing binary
//! bundle does not prevent the probability bundle from loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{ArtifactKind, ArtifactLoadError, PredictorArtifact};
use crate::ports::ArtifactStore;

pub const BINARY_ARTIFACT_FILE: &str = "stroke_binary_model.json";
pub const PROBABILITY_ARTIFACT_FILE: &str = "stroke_probability_model.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "artifacts.sig";

/// Manifest format version understood by this build.
pub const MANIFEST_VERSION: u32 = 1;

/// Allowed clock skew for manifest timestamps, in seconds.
const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Signed list of artifact hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    #[serde(default)]
    pub created_at: Option<i64>,
    /// File name -> lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

/// File name of the bundle for `kind`.
#[must_use]
pub fn artifact_file_name(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Binary => BINARY_ARTIFACT_FILE,
        ArtifactKind::Probability => PROBABILITY_ARTIFACT_FILE,
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Parse a base64-encoded Ed25519 verifying key.
///
/// # Errors
/// Returns a description of the problem for invalid base64, wrong length or
/// an invalid curve point.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| "Invalid public key base64".to_string())?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("Invalid public key length {} (expected 32 bytes)", bytes.len()))?;
    VerifyingKey::from_bytes(&key).map_err(|_| "Invalid verifying key".to_string())
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Artifact store backed by a directory of JSON bundles.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    require_signature: bool,
    verifying_key: Option<VerifyingKey>,
}

impl FsArtifactStore {
    /// Create a store reading from `dir`. Unsigned directories are accepted.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            require_signature: false,
            verifying_key: None,
        }
    }

    /// Reject directories that carry no signed manifest.
    #[must_use]
    pub fn require_signature(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    /// Key used to verify `artifacts.sig`.
    #[must_use]
    pub fn with_verifying_key(mut self, key: VerifyingKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    /// Verify the signed manifest, if any.
    ///
    /// Returns `Ok(None)` for an unsigned directory when signatures are optional.
    fn verified_manifest(
        &self,
        kind: ArtifactKind,
    ) -> Result<Option<ArtifactManifest>, ArtifactLoadError> {
        let sig_err = |reason: String| ArtifactLoadError::Signature { kind, reason };

        let sig_path = self.dir.join(SIGNATURE_FILE);
        let manifest_path = self.dir.join(MANIFEST_FILE);

        if !sig_path.exists() || !manifest_path.exists() {
            if self.require_signature {
                tracing::error!(
                    "No signed manifest in {:?}; signed artifacts are required",
                    self.dir
                );
                return Err(sig_err("signed manifest required".into()));
            }
            tracing::warn!("Loading UNSIGNED {kind} artifact from {:?}", self.dir);
            return Ok(None);
        }

        // A manifest present without a key to check it is treated as a failure.
        let key = self
            .verifying_key
            .as_ref()
            .ok_or_else(|| sig_err("manifest present but no verifying key configured".into()))?;

        let sig_bytes = fs::read(&sig_path)
            .map_err(|e| sig_err(format!("failed to read signature: {e}")))?;
        let sig_bytes: [u8; 64] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| sig_err("invalid signature length (expected 64 bytes)".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        let manifest_bytes = fs::read(&manifest_path)
            .map_err(|e| sig_err(format!("failed to read manifest: {e}")))?;
        key.verify(&manifest_bytes, &signature)
            .map_err(|_| sig_err("invalid manifest signature".into()))?;

        let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| sig_err(format!("invalid manifest format: {e}")))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(sig_err(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        if let Some(created_at) = manifest.created_at {
            if created_at > chrono::Utc::now().timestamp() + MAX_CLOCK_SKEW_SECS {
                return Err(sig_err("manifest created_at is in the future".into()));
            }
        }

        Ok(Some(manifest))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn load(&self, kind: ArtifactKind) -> Result<PredictorArtifact, ArtifactLoadError> {
        let file_name = artifact_file_name(kind);
        let path = self.dir.join(file_name);

        if !path.exists() {
            return Err(ArtifactLoadError::NotFound {
                kind,
                path: path.display().to_string(),
            });
        }

        let manifest = self.verified_manifest(kind)?;

        let bytes = fs::read(&path).map_err(|source| ArtifactLoadError::Io { kind, source })?;

        if let Some(manifest) = manifest {
            let expected = manifest.files.get(file_name).ok_or_else(|| {
                ArtifactLoadError::Signature {
                    kind,
                    reason: format!("{file_name} is not bound by the signed manifest"),
                }
            })?;
            if !constant_time_eq_str(&sha256_hex(&bytes), expected) {
                return Err(ArtifactLoadError::Signature {
                    kind,
                    reason: format!("hash mismatch for {file_name}"),
                });
            }
            tracing::debug!("{kind} artifact hash verified against signed manifest");
        }

        let artifact = PredictorArtifact::from_json(kind, &bytes)?;

        tracing::info!(
            "Loaded {kind} artifact from {:?} (n_features={})",
            path,
            artifact.contract.feature_names.len()
        );

        Ok(artifact)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use crate::domain::artifact::tests::logistic_json;
    use ed25519_dalek::{Signer, SigningKey};
    use tempfile::tempdir;

    fn write_artifact(dir: &Path, kind: ArtifactKind) -> Vec<u8> {
        let bytes = logistic_json(kind.as_str(), 0.0).to_string().into_bytes();
        fs::write(dir.join(artifact_file_name(kind)), &bytes).expect("write artifact");
        bytes
    }

    fn sign(dir: &Path, key: &SigningKey, files: &[(&str, &[u8])]) {
        let manifest = ArtifactManifest {
            version: MANIFEST_VERSION,
            created_at: Some(chrono::Utc::now().timestamp()),
            files: files
                .iter()
                .map(|(name, bytes)| ((*name).to_string(), sha256_hex(bytes)))
                .collect(),
        };
        let manifest_bytes = serde_json::to_vec(&manifest).expect("serialize manifest");
        fs::write(dir.join(MANIFEST_FILE), &manifest_bytes).expect("write manifest");
        let signature: Signature = key.sign(&manifest_bytes);
        fs::write(dir.join(SIGNATURE_FILE), signature.to_bytes()).expect("write signature");
    }

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn test_loads_unsigned_bundle() {
        let temp = tempdir().expect("tempdir");
        write_artifact(temp.path(), ArtifactKind::Probability);

        let store = FsArtifactStore::new(temp.path());
        let artifact = store.load(ArtifactKind::Probability).expect("loads");
        assert_eq!(artifact.kind, ArtifactKind::Probability);
    }

    #[test]
    fn test_missing_bundle_is_not_found() {
        let temp = tempdir().expect("tempdir");
        write_artifact(temp.path(), ArtifactKind::Probability);

        let store = FsArtifactStore::new(temp.path());
        let err = store.load(ArtifactKind::Binary).expect_err("absent");
        assert!(matches!(err, ArtifactLoadError::NotFound { .. }));
    }

    #[test]
    fn test_require_signature_rejects_unsigned() {
        let temp = tempdir().expect("tempdir");
        write_artifact(temp.path(), ArtifactKind::Binary);

        let store = FsArtifactStore::new(temp.path()).require_signature(true);
        let err = store.load(ArtifactKind::Binary).expect_err("unsigned");
        assert!(matches!(err, ArtifactLoadError::Signature { .. }));
    }

    #[test]
    fn test_signed_bundles_load() {
        let temp = tempdir().expect("tempdir");
        let binary = write_artifact(temp.path(), ArtifactKind::Binary);
        let probability = write_artifact(temp.path(), ArtifactKind::Probability);
        let key = test_key();
        sign(
            temp.path(),
            &key,
            &[(BINARY_ARTIFACT_FILE, &binary), (PROBABILITY_ARTIFACT_FILE, &probability)],
        );

        let store = FsArtifactStore::new(temp.path())
            .require_signature(true)
            .with_verifying_key(key.verifying_key());
        assert!(store.load(ArtifactKind::Binary).is_ok());
        assert!(store.load(ArtifactKind::Probability).is_ok());
    }

    #[test]
    fn test_tampered_bundle_fails_alone() {
        let temp = tempdir().expect("tempdir");
        let binary = write_artifact(temp.path(), ArtifactKind::Binary);
        let probability = write_artifact(temp.path(), ArtifactKind::Probability);
        let key = test_key();
        sign(
            temp.path(),
            &key,
            &[(BINARY_ARTIFACT_FILE, &binary), (PROBABILITY_ARTIFACT_FILE, &probability)],
        );

        // Rewrite the binary bundle after signing.
        let tampered = logistic_json("binary", 3.0).to_string();
        fs::write(temp.path().join(BINARY_ARTIFACT_FILE), tampered).expect("tamper");

        let store = FsArtifactStore::new(temp.path()).with_verifying_key(key.verifying_key());
        let err = store.load(ArtifactKind::Binary).expect_err("tampered");
        assert!(err.to_string().contains("hash mismatch"));
        assert!(store.load(ArtifactKind::Probability).is_ok());
    }

    #[test]
    fn test_unbound_bundle_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let probability = write_artifact(temp.path(), ArtifactKind::Probability);
        write_artifact(temp.path(), ArtifactKind::Binary);
        let key = test_key();
        sign(temp.path(), &key, &[(PROBABILITY_ARTIFACT_FILE, &probability)]);

        let store = FsArtifactStore::new(temp.path()).with_verifying_key(key.verifying_key());
        let err = store.load(ArtifactKind::Binary).expect_err("not in manifest");
        assert!(err.to_string().contains("not bound"));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let probability = write_artifact(temp.path(), ArtifactKind::Probability);
        sign(temp.path(), &test_key(), &[(PROBABILITY_ARTIFACT_FILE, &probability)]);

        let other = SigningKey::from_bytes(&[9u8; 32]);
        let store = FsArtifactStore::new(temp.path()).with_verifying_key(other.verifying_key());
        let err = store.load(ArtifactKind::Probability).expect_err("bad signature");
        assert!(err.to_string().contains("invalid manifest signature"));
    }

    #[test]
    fn test_verifying_key_from_b64() {
        let key = test_key().verifying_key();
        let b64 = base64::engine::general_purpose::STANDARD.encode(key.to_bytes());
        assert_eq!(verifying_key_from_b64(&b64), Ok(key));
        assert!(verifying_key_from_b64("AAAA").is_err());
    }
}
