use crate::error::ConfigError;
use crate::settings::LoggingSettings;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// Console output goes to stderr so command output on stdout stays clean.
/// When `settings.directory` is set, a daily-rolling `dbal.log` is written
/// there as well; keep the returned guard alive until exit so buffered lines
/// are flushed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| ConfigError::ValidationError(format!("invalid logging.level: {e}")))?;

    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let guard = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "dbal.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .try_init()
                .map_err(|e| ConfigError::LoggingError(e.to_string()))?;
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .map_err(|e| ConfigError::LoggingError(e.to_string()))?;
            None
        }
    };

    debug!(
        level = %settings.level,
        directory = ?settings.directory,
        "Logging initialized."
    );
    Ok(guard)
}
