//! Per-task log file.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log file name for a task.
pub fn log_file_name(task_id: &str) -> String {
    format!("{task_id}-bs.log")
}

/// Route tracing output to `{dir}/{task_id}-bs.log`, appending.
///
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init_task_log(dir: &Path, task_id: &str) -> anyhow::Result<(WorkerGuard, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;

    let file_name = log_file_name(task_id);
    let appender = tracing_appender::rolling::never(dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()
        .context("logging already initialized")?;

    Ok((guard, dir.join(file_name)))
}
