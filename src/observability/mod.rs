//! Observability and structured logging infrastructure.
//!
//! This module provides production-grade logging using the tracing framework,
//! enabling filtering, performance profiling, and production observability.
//!
//! # Environment Configuration
//!
//! ```bash
//! # Set log level for all modules
//! RUST_LOG=debug cargo run
//!
//! # Component-specific levels
//! RUST_LOG=evm_log_indexer=debug,sqlx=warn cargo run
//!
//! # Enable JSON output for production
//! LOG_JSON=true cargo run
//!
//! # Write logs to file with daily rotation
//! LOG_FILE=./logs/indexer.log cargo run
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Initialize the tracing subscriber with configurable output formats.
///
/// Sets up structured logging for the application, with support for:
/// - Console output (pretty-printed for development, JSON for production)
/// - Optional file output with daily rotation
/// - Environment-based filtering via `RUST_LOG`
///
/// # Arguments
///
/// * `log_level` - Optional log level override (e.g., "debug", "info").
///   Falls back to the `RUST_LOG` environment variable.
/// * `log_file` - Optional file path for log output. Enables daily rotation.
/// * `json_output` - If true, outputs JSON suitable for log aggregation.
///
/// Returns a worker guard that must be held for the lifetime of the process
/// when file logging is enabled; dropping it stops the background writer.
///
/// # Errors
///
/// Returns an error if the log file's directory cannot be created or the
/// subscriber fails to initialize.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    // Build environment filter from RUST_LOG or provided level
    let env_filter = if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else if let Some(level) = log_level {
        EnvFilter::new(level)
    } else {
        // Default: info for our app, warn for dependencies
        EnvFilter::new("evm_log_indexer=info,warn")
    };

    // Console layer (stdout)
    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    };

    // File layer (optional)
    let mut guard = None;
    let file_layer = if let Some(ref path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_else(|| OsStr::new("indexer.log")),
        );

        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        // File always uses JSON for structured log analysis
        Some(
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        )
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(file) = file_layer {
        subscriber.with(file).try_init()?;
    } else {
        subscriber.try_init()?;
    }

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized successfully"
    );

    Ok(guard)
}

/// Initialize tracing with test-specific configuration.
///
/// Output is directed to the test harness, visible with
/// `cargo test -- --nocapture`.
#[cfg(test)]
pub fn init_test_tracing() {
    use tracing_subscriber::fmt::format::FmtSpan;

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .with_span_events(FmtSpan::CLOSE)
        .pretty()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_default() {
        // Can only initialize once per process, so don't assert on success
        let result = init_tracing(None, None, false);
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_init_tracing_json() {
        let result = init_tracing(Some("info".to_string()), None, true);
        assert!(result.is_ok() || result.is_err());
    }
}
