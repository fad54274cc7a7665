//! Shared logging utilities for Axon binaries and tests.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "axon=info,axon_engine=info,axon_batch=info,axon_backend=info";

/// Logging configuration shared by Axon entry points.
pub struct LogConfig<'a> {
    /// Name used for the log file, when file logging is enabled
    pub app_name: &'a str,
    /// Mirror the full filter to stderr instead of warnings only
    pub verbose: bool,
    /// Optional directory for an append-only log file
    pub log_dir: Option<PathBuf>,
}

impl<'a> LogConfig<'a> {
    pub fn new(app_name: &'a str) -> Self {
        Self {
            app_name,
            verbose: false,
            log_dir: None,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

/// Initialize tracing with stderr output and an optional file target.
///
/// The filter comes from `RUST_LOG` when set, falling back to the crate
/// defaults. Fails if a subscriber is already installed.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let base_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let console_filter = if config.verbose {
        base_filter()
    } else {
        EnvFilter::new("warn")
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter)
        .boxed();

    let mut layers: Vec<Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>> =
        vec![console_layer];

    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let path = dir.join(format!("{}.log", sanitize_name(config.app_name)));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_filter(base_filter())
            .boxed();

        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("axon-worker"), "axon-worker");
        assert_eq!(sanitize_name("a b/c"), "a_b_c");
    }

    #[test]
    fn test_init_logging_with_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::new("axon-test").with_log_dir(dir.path());
        // First install may race with other tests owning the global
        // subscriber; either way the call must not panic
        let _ = init_logging(config);
        tracing::info!("logging smoke line");
    }
}
