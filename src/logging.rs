use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with a daily-rotating file appender and optional
/// console output.
///
/// The filter honors `RUST_LOG` when set; otherwise everything at `info` and
/// above is recorded. Engine messages destined for the user travel through
/// the event sink, not through tracing — this log is for operators
/// diagnosing a run.
///
/// # Arguments
/// * `log_dir` - Directory for log files, created when missing
/// * `log_prefix` - Prefix for the rotated log files
/// * `console` - Also mirror records to stderr
///
/// # Returns
/// A guard that must be held for the duration of the program to keep the
/// non-blocking writer flushing.
pub fn init(
    log_dir: &str,
    log_prefix: &str,
    console: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_path = Utf8Path::new(log_dir);
    if !log_path.exists() {
        fs::create_dir_all(log_path)
            .with_context(|| format!("failed to create log directory: {log_dir}"))?;
    }

    let file_appender = rolling::daily(log_dir, log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    if console {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("logging initialized: dir={log_dir}, prefix={log_prefix}, console={console}");

    Ok(guard)
}
