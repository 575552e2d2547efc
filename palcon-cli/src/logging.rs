use std::path::PathBuf;

use color_eyre::Report;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    Layer, filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Filter directives for both sinks, e.g. `PALCON_LOG=palcon_host=trace`.
const LOG_ENV: &str = "PALCON_LOG";

/// When set, a daily-rolling log file is written under this directory.
const LOG_DIR_ENV: &str = "PALCON_LOG_DIR";

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default console level when `PALCON_LOG` names none
    pub console_level: Level,
    /// Default file level when `PALCON_LOG` names none
    pub file_level: Level,
    /// Directory for log files; file logging is skipped when `None`
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: Level::WARN,
            file_level: Level::DEBUG,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
            config.log_dir = Some(PathBuf::from(log_dir));
        }

        config
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Report> {
    let mut layers = vec![];
    let mut guard = None;

    // Create file logging layer if a log directory is specified
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;

        let file_appender = tracing_appender::rolling::daily(log_dir, "palcon.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        let file_filter = EnvFilter::builder()
            .with_default_directive(config.file_level.into())
            .with_env_var(LOG_ENV)
            .from_env_lossy();

        layers.push(
            fmt::layer()
                .with_writer(non_blocking)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    let console_filter = EnvFilter::builder()
        .with_default_directive(config.console_level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    layers.push(
        fmt::layer()
            .with_target(false) // Hide module paths for cleaner console output
            .with_filter(console_filter)
            .boxed(),
    );

    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}
