use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

const TELEMETRY_FILE: &str = "telemetry.jsonl";
const INFERENCE_TARGETS: [&str; 2] = ["rdn_core", "rdn_infer"];

pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub telemetry_path: PathBuf,
    /// False when another global subscriber was already in place; the file then stays empty.
    pub installed: bool,
}

/// Sampler telemetry goes next to the summary so one run directory holds every artifact.
pub fn telemetry_path(outputs: &ResolvedOutputs) -> PathBuf {
    outputs
        .summary_md
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(TELEMETRY_FILE)
}

/// `RUST_LOG` wins; otherwise only the inference crates log, at the configured level.
fn inference_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = INFERENCE_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",");
        EnvFilter::new(directives)
    })
}

/// Installs a JSON subscriber writing sampler telemetry, when structured logging is enabled.
pub fn init_logging(
    logging: &LoggingConfig,
    outputs: &ResolvedOutputs,
) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let telemetry_path = telemetry_path(outputs);
    if let Some(dir) = telemetry_path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating telemetry directory at {}", dir.display()))?;
    }
    let file = File::create(&telemetry_path)
        .with_context(|| format!("creating telemetry file at {}", telemetry_path.display()))?;

    let (writer, guard) = non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(file);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(inference_filter(logging.level().unwrap_or(Level::INFO)))
        .with_target(true)
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    let installed = match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(
                error = %err,
                telemetry = %telemetry_path.display(),
                "global subscriber already installed; sampler telemetry stays with it"
            );
            false
        }
    };

    Ok(Some(LoggingGuard {
        _guard: guard,
        telemetry_path,
        installed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(dir: &Path) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: dir.join("marginals.jsonl"),
            summary_md: dir.join("report").join("summary.md"),
            dot: dir.join("rdn.dot"),
        }
    }

    fn structured() -> LoggingConfig {
        LoggingConfig {
            enable_structured: true,
            tracing_level: "debug".to_string(),
        }
    }

    #[test]
    fn disabled_logging_installs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_logging(&LoggingConfig::default(), &outputs(dir.path())).unwrap();
        assert!(guard.is_none());
        assert!(!dir.path().join("report").exists());
    }

    #[test]
    fn telemetry_lands_next_to_summary() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_logging(&structured(), &outputs(dir.path()))
            .unwrap()
            .expect("guard");
        assert_eq!(
            guard.telemetry_path,
            dir.path().join("report").join("telemetry.jsonl")
        );
        assert!(guard.telemetry_path.exists());
    }

    #[test]
    fn bare_summary_name_keeps_telemetry_in_working_dir() {
        let outputs = ResolvedOutputs {
            jsonl: PathBuf::from("marginals.jsonl"),
            summary_md: PathBuf::from("summary.md"),
            dot: PathBuf::from("rdn.dot"),
        };
        assert_eq!(telemetry_path(&outputs), PathBuf::from(".").join("telemetry.jsonl"));
    }

    #[test]
    fn second_init_reports_existing_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        let _first = init_logging(&structured(), &outputs(dir.path())).unwrap();
        let second = init_logging(&structured(), &outputs(dir.path()))
            .unwrap()
            .expect("guard");
        assert!(!second.installed);
        assert!(second.telemetry_path.exists());
    }
}
