//! Tracing setup for the attendance service.
//!
//! Under systemd, log lines go straight to journald. Anywhere else they
//! land in daily rolling files beneath the given directory. Verbosity is
//! read from the `ROLLCALL_LOG` environment variable and defaults to
//! `info`.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Returns the guard that flushes buffered file output on drop; the caller
/// keeps it alive for the rest of the process. It is `None` when journald
/// took the logs and there is nothing to flush.
pub fn init(log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_env("ROLLCALL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    if let Ok(journald) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter)
            .with(journald)
            .init();
        tracing::debug!("logging to journald");
        return Ok(None);
    }

    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, "rollcall.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    tracing::debug!(dir = %log_dir.display(), "logging to rolling file");
    Ok(Some(guard))
}
