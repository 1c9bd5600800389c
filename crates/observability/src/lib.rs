// crates/observability/src/lib.rs
//! Process-wide logging: a console layer plus an optional plain-text log file.
//!
//! The filter defaults to `warn` for dependencies and `info` for our own
//! crates. `RUST_LOG`, when set, replaces it entirely.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const OWN_CRATES: &[&str] = &["jobbot_core", "jobbot_github", "jobbot_manager"];

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Raise our own crates to `debug`.
    pub debug: bool,
    /// Also append logs to this file.
    pub log_path: Option<PathBuf>,
}

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.join(",")
}

fn build_env_filter(debug: bool) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = default_directives(debug);
    EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{directives}': {e}"))
}

fn file_writer(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a log file is configured; it must be
/// held until shutdown or buffered lines are lost.
pub fn init_logging(opts: &LoggingOptions) -> anyhow::Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(build_env_filter(opts.debug)?);

    let (file_layer, guard) = match &opts.log_path {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_writer(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .with_filter(build_env_filter(opts.debug)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::debug!(debug = opts.debug, log_path = ?opts.log_path, "logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(false),
            "warn,jobbot_core=info,jobbot_github=info,jobbot_manager=info"
        );
        assert!(default_directives(true).contains("jobbot_core=debug"));
        assert!(default_directives(true).starts_with("warn,"));
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(default_directives(true)).is_ok());
    }

    #[test]
    fn test_file_writer_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs/nested/manager.log");
        file_writer(&path).unwrap();
        assert!(path.exists());
    }
}
