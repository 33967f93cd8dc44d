//! Logging setup for the tracealloc binaries.
//!
//! The console gets the user-chosen level for tracealloc crates. A replay
//! log file, when enabled, records every dispatched event at trace level.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::TraceAllocError;

/// File name of the per-run log inside the logs directory.
pub const RUN_LOG_FILE: &str = "tracealloc-last-run.log";

/// Crates whose events reach the console at the chosen level.
const LOG_TARGETS: [&str; 3] = ["tracealloc", "tracealloc_core", "tracealloc_sim"];

/// Builds the console filter for `level`, unless `RUST_LOG` overrides it.
fn console_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect();
        EnvFilter::new(format!("warn,{}", directives.join(",")))
    })
}

/// Installs the global subscriber.
///
/// With `logs_dir`, a trace-level copy of every event is written to
/// [`RUN_LOG_FILE`] inside it, replacing the previous run's log. Returns the
/// path of that file.
///
/// # Errors
///
/// - `TraceAllocError::Io` - The logs directory or file cannot be created
/// - `TraceAllocError::Configuration` - A global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<Option<PathBuf>, TraceAllocError> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter(console_level));

    let (file_layer, log_file_path) = match logs_dir {
        Some(dir) => {
            create_dir_all(dir)?;
            let path = dir.join(RUN_LOG_FILE);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(Mutex::new(File::create(&path)?))
                .with_filter(EnvFilter::new("trace"));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|error| TraceAllocError::Configuration {
            reason: format!("tracing already initialized: {error}"),
        })?;

    match &log_file_path {
        Some(path) => tracing::debug!("Logging at {console_level}, run log at {}", path.display()),
        None => tracing::debug!("Logging at {console_level}, no run log"),
    }

    Ok(log_file_path)
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Run summaries and allocator statistics
    Info,
    /// Per-run setup and failed allocations
    Debug,
    /// Every dispatched event
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use tracealloc_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_log_level_mapping() {
        assert_eq!(CliLogLevel::Error.as_tracing_level(), Level::ERROR);
        assert_eq!(CliLogLevel::Trace.as_tracing_level(), Level::TRACE);
        assert_eq!(CliLogLevel::Warn.to_string(), "warn");
    }
}
