//! Structured logging (the log sink).
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber once per process
//! - Human-readable records on stdout
//! - Optional JSON records in a daily-rotated file under `log_dir`
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - File output goes through a non-blocking writer; the returned guard
//!   must live until exit so buffered records are flushed

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;

/// File name prefix for rotated log files.
pub const LOG_FILE_PREFIX: &str = "edge-proxy.log";

/// Build the level filter: `RUST_LOG` if set, else `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialise logging. Returns the file writer guard when file output is on.
///
/// Calling this twice is harmless: the second install fails silently.
pub fn init_logging(config: &ObservabilityConfig) -> Option<WorkerGuard> {
    let stdout_layer = fmt::layer().with_target(true).boxed();

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        if let Some(dir) = &config.log_dir {
            tracing::debug!(log_dir = %dir.display(), "File logging enabled");
        }
    }
    guard
}
