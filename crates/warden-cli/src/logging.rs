//! Logging setup for the `warden` binary.
//!
//! Events go to stderr, filtered by `WARDEN_LOG` (default `info`). When a log
//! directory is available they are also written to a daily rolling file
//! `warden.log.YYYY-MM-DD` without colors.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FILTER_ENV: &str = "WARDEN_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(dir) = log_dir else {
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(stderr_layer)
            .try_init();
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(dir) {
        // No subscriber yet, so report directly.
        eprintln!("Failed to create log directory {}: {e}", dir.display());
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(stderr_layer)
            .try_init();
        return None;
    }

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
        dir,
        "warden.log",
    ));
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    Some(guard)
}
