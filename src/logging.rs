//! File-based logging
//!
//! The command loop owns stdin and stdout, so tracing output goes to a daily
//! rotating file instead of the terminal.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingSettings;

const LOG_FILE_PREFIX: &str = "tempo";

/// Initialize the logging system.
///
/// Logs are written to `<dir>/tempo.YYYY-MM-DD.log` with daily rotation.
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let log_dir = Path::new(&settings.dir);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);

    // Non-blocking so a slow disk never stalls the runtime
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes on drop and must live as long as the process
    Box::leak(Box::new(guard));

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("tempo=debug,reqwest=info,warn"));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs written to {}/", log_dir.display());

    Ok(())
}

/// Log the outcome of a catalog request
#[macro_export]
macro_rules! log_api_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "Catalog request successful"),
            Err(e) => tracing::error!(operation = $operation, error = %e, "Catalog request failed"),
        }
    };
}

/// Log the start of a catalog request with additional context
#[macro_export]
macro_rules! log_api_request {
    ($operation:expr, $($field:tt)*) => {
        tracing::debug!(operation = $operation, $($field)*, "Catalog request started");
    };
}
