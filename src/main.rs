//! StrokeCare: stroke risk assessment CLI.
//!
//! ```text
//! strokecare [INPUT]      assess the JSON object in INPUT (or stdin, or "-")
//! strokecare --health     print which predictor artifacts loaded
//! ```
//!
//! The assessment (or health status) is written to stdout as JSON; logs go to
//! stderr unless `STROKECARE_LOG_MODE=file`.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strokecare::adapters::sanitize::SanitizingMakeWriter;
use strokecare::config::Settings;
use strokecare::domain::RawPatientInput;
use strokecare::{ModelRegistry, PredictionService, StrokeCareError};

enum Command {
    Health,
    Assess(Option<String>),
}

fn parse_args() -> Result<Command> {
    let mut input = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--health" => return Ok(Command::Health),
            "-h" | "--help" => {
                println!("usage: strokecare [--health] [INPUT.json | -]");
                std::process::exit(0);
            }
            "-" => input = None,
            other if other.starts_with('-') => anyhow::bail!("unknown option: {other}"),
            other => input = Some(other.to_string()),
        }
    }
    Ok(Command::Assess(input))
}

fn read_input(path: Option<&str>) -> strokecare::Result<RawPatientInput> {
    let text = match path {
        Some(p) => std::fs::read_to_string(p)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    match serde_json::from_str::<serde_json::Value>(&text)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StrokeCareError::Validation(format!(
            "expected a JSON object, got {}",
            match other {
                serde_json::Value::Array(_) => "an array",
                serde_json::Value::String(_) => "a string",
                serde_json::Value::Number(_) => "a number",
                serde_json::Value::Bool(_) => "a boolean",
                _ => "null",
            }
        ))),
    }
}

fn main() -> Result<()> {
    // stdout carries the JSON result, so logs default to stderr.
    let log_mode = std::env::var("STROKECARE_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file = std::env::var("STROKECARE_LOG_FILE")
            .unwrap_or_else(|_| "strokecare.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as the open error below.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("failed to open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    let command = parse_args()?;
    let settings = Settings::from_env().map_err(StrokeCareError::from)?;

    let registry = Arc::new(ModelRegistry::load(&settings.artifact_store()));

    match command {
        Command::Health => {
            println!("{}", serde_json::to_string_pretty(&registry.status())?);
        }
        Command::Assess(path) => {
            let raw = read_input(path.as_deref()).context("failed to read patient input")?;

            let mut service = PredictionService::new(registry).with_fallback(settings.fallback_scorer());
            if let Some(worker) = settings.narrative_worker() {
                service = service.with_narrative(worker);
            }

            let assessment = service.assess(&raw);
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
    }

    Ok(())
}
