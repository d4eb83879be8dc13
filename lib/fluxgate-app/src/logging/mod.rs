//! Logging.

use fluxgate_error::GenericError;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

mod config;
pub use self::config::{LogLevel, LoggingConfiguration};

mod layer;
use self::layer::build_formatting_layer;

/// Logs a message to standard error and exits the process with a non-zero exit code.
pub fn fatal_and_exit(message: String) -> ! {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

/// Initializes the logging subsystem for `tracing`.
///
/// Events are written to standard error, filtered by the effective level of `config` (see
/// [`LoggingConfiguration::env_filter`]). When `log-format-json` is enabled, each event is written as a single JSON
/// object. Otherwise, a human-readable format is used.
///
/// # Errors
///
/// If the logging subsystem was already initialized, an error will be returned.
pub fn initialize_logging(config: &LoggingConfiguration) -> Result<(), GenericError> {
    let layer = build_formatting_layer(config, std::io::stderr).with_filter(config.env_filter());

    tracing_subscriber::registry().with(layer).try_init()?;

    Ok(())
}
