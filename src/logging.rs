use crate::config::LoggingConfig;
use crate::error::{Result, SupervisorError};
use std::path::PathBuf;
use std::sync::Once;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, registry::Registry};

static LOGGER_INIT: Once = Once::new();

const LOG_FILE_NAME: &str = "k0s-supervisor.log";

/// Initialize the logging system once per process.
///
/// `RUST_LOG` wins over the configured level. File logging writes to
/// `<log_dir>/k0s-supervisor.log` when enabled.
pub fn init_logging(config: &LoggingConfig, log_dir: PathBuf, log_to_stdout: bool) -> Result<()> {
    let mut init_result = Ok(());

    LOGGER_INIT.call_once(|| {
        init_result = init_logging_internal(config, log_dir, log_to_stdout);
    });

    init_result
}

fn init_logging_internal(config: &LoggingConfig, log_dir: PathBuf, log_to_stdout: bool) -> Result<()> {
    let log_level = config.level.to_lowercase();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .map_err(|e| SupervisorError::ConfigError(format!("Invalid log level '{log_level}': {e}")))?;

    let file_layer = if config.file_enabled {
        std::fs::create_dir_all(&log_dir).map_err(|e| {
            SupervisorError::ConfigError(format!("Failed to create log directory: {e}"))
        })?;
        let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
        Some(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
    } else {
        None
    };

    let stdout_layer = log_to_stdout.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false)
    });

    if file_layer.is_none() && stdout_layer.is_none() {
        return Err(SupervisorError::ConfigError(
            "File logging must be enabled when stdout logging is off".to_string(),
        ));
    }

    Registry::default()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| SupervisorError::ConfigError(format!("Failed to install logger: {e}")))?;

    info!("Logging initialized with level: {}", log_level);
    if config.file_enabled {
        info!("Log file: {}", log_dir.join(LOG_FILE_NAME).display());
    }

    Ok(())
}

/// Log a structured message for component lifecycle events
pub fn log_component_event(component: &str, event: &str, details: &str) {
    info!(target: "component", component = component, event = event, details = details);
}

/// Log a warning with context
pub fn log_warning(component: &str, warning: &str, context: Option<&str>) {
    if let Some(ctx) = context {
        warn!(component = component, warning = warning, context = ctx);
    } else {
        warn!(component = component, warning = warning);
    }
}
