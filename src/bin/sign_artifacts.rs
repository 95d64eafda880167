//! Signing utility for predictor artifact directories.
//!
//! # Usage
//!
//! ```bash
//! # New Ed25519 keypair (seed written with 0600 permissions)
//! cargo run --bin sign_artifacts -- keygen --out-seed <path> [--out-pub <path>] [--force]
//!
//! # Write manifest.json + artifacts.sig for every predictor bundle in <dir>
//! STROKECARE_SIGNING_KEY_B64_FILE=<seed> cargo run --bin sign_artifacts -- sign <dir>
//! ```
//!
//! The service verifies the result with `STROKECARE_ARTIFACT_PUBKEY_B64[_FILE]`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use strokecare::adapters::artifacts::{
    sha256_hex, ArtifactManifest, BINARY_ARTIFACT_FILE, MANIFEST_FILE, MANIFEST_VERSION,
    PROBABILITY_ARTIFACT_FILE, SIGNATURE_FILE,
};

const USAGE: &str = "Usage:\n  sign_artifacts keygen --out-seed <path> [--out-pub <path>] [--force]\n  sign_artifacts sign <artifact_dir>";

const KEY_FILE_ENV: &str = "STROKECARE_SIGNING_KEY_B64_FILE";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn read_signing_seed() -> Result<Seed> {
    let path = env::var(KEY_FILE_ENV)
        .with_context(|| format!("Missing signing key: set {KEY_FILE_ENV}"))?;
    let content = Zeroizing::new(
        fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
    );

    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(content.trim())
            .context("Invalid base64 in signing key")?,
    );
    if raw.len() != 32 {
        bail!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }

    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

fn write_file(path: &Path, contents: &[u8], mode: u32, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("Refusing to overwrite existing file {path:?}. Use --force.");
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {parent:?}"))?;
    }

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = opts
        .open(path)
        .with_context(|| format!("Failed to open {path:?}"))?;
    file.write_all(contents)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn keygen(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut out_seed: Option<PathBuf> = None;
    let mut out_pub: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out-seed" => out_seed = args.next().map(PathBuf::from),
            "--out-pub" => out_pub = args.next().map(PathBuf::from),
            "--force" => force = true,
            _ => bail!("Unknown arg: {arg}\n{USAGE}"),
        }
    }
    let out_seed = out_seed.with_context(|| USAGE.to_string())?;

    let mut seed = Seed([0u8; 32]);
    OsRng.fill_bytes(&mut seed.0);

    let verifying_key = SigningKey::from_bytes(&seed.0).verifying_key();
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));
    let pub_b64 = general_purpose::STANDARD.encode(verifying_key.as_bytes());

    write_file(&out_seed, seed_b64.as_bytes(), 0o600, force)?;
    println!("Wrote signing seed (base64) to {out_seed:?}");

    if let Some(pub_path) = &out_pub {
        write_file(pub_path, pub_b64.as_bytes(), 0o644, force)?;
        println!("Wrote public key (base64) to {pub_path:?}");
    }

    // Print only non-secret material.
    println!("STROKECARE_ARTIFACT_PUBKEY_B64={pub_b64}");
    Ok(())
}

fn sign(dir: &Path) -> Result<()> {
    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);

    let mut files = BTreeMap::new();
    for name in [BINARY_ARTIFACT_FILE, PROBABILITY_ARTIFACT_FILE] {
        let path = dir.join(name);
        if path.exists() {
            let bytes = fs::read(&path).with_context(|| format!("Failed to read {path:?}"))?;
            files.insert(name.to_string(), sha256_hex(&bytes));
        }
    }
    if files.is_empty() {
        bail!(
            "No artifacts found in {dir:?} (expected {BINARY_ARTIFACT_FILE} or {PROBABILITY_ARTIFACT_FILE})"
        );
    }

    let manifest = ArtifactManifest {
        version: MANIFEST_VERSION,
        created_at: Some(chrono::Utc::now().timestamp()),
        files,
    };
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest")?;

    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("Failed to write {manifest_path:?}"))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes()).with_context(|| format!("Failed to write {sig_path:?}"))?;

    println!("Signed manifest: {manifest_path:?} ({} file(s))", manifest.files.len());
    println!("Wrote signature: {sig_path:?}");
    println!("Public key (hex)={}", to_hex(signing_key.verifying_key().as_bytes()));
    Ok(())
}

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("keygen") => keygen(args),
        Some("sign") => {
            let dir = args.next().map(PathBuf::from).with_context(|| USAGE.to_string())?;
            sign(&dir)
        }
        Some("-h" | "--help") => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!("{USAGE}"),
    }
}
