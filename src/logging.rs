//! Tracing setup shared by the binaries.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Install the global subscriber.
///
/// Always logs to stderr. When `MYINFO_LOG_DIR` is set, also writes a daily
/// rolling `<file_prefix>.log` there. Keep the returned guard alive for the
/// life of the process or buffered file output is lost.
pub fn init(file_prefix: &str) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let log_dir = std::env::var("MYINFO_LOG_DIR").ok().filter(|d| !d.is_empty());
    match log_dir {
        Some(dir) => {
            let appender =
                tracing_appender::rolling::daily(Path::new(&dir), format!("{file_prefix}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}
