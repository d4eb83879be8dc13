use fluxgate_config::GenericConfiguration;
use fluxgate_error::{ErrorContext as _, GenericError};
use serde::Deserialize;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn default_log_level() -> LogLevel {
    LevelFilter::INFO.into()
}

/// Logging configuration.
///
/// Read from the same option set as the publisher itself. Keys reach this type in their normalized spelling, so
/// `log-level` arrives as `log_level`:
///
/// - `log-level`: filtering directives, in `EnvFilter` syntax (defaults to `info`)
/// - `debug`: forces the `debug` level, overriding `log-level`
/// - `log-format-json`: writes events as JSON objects
#[derive(Deserialize)]
pub struct LoggingConfiguration {
    #[serde(default = "default_log_level")]
    log_level: LogLevel,

    #[serde(default)]
    debug: bool,

    #[serde(default)]
    log_format_json: bool,
}

impl LoggingConfiguration {
    /// Creates a new `LoggingConfiguration` instance from the given configuration.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be deserialized as `LoggingConfiguration`, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        let logging_config = config.as_typed()?;
        Ok(logging_config)
    }

    /// Returns `true` if events should be written as JSON.
    pub fn log_format_json(&self) -> bool {
        self.log_format_json
    }

    /// Returns the filter to apply to events.
    pub fn env_filter(&self) -> EnvFilter {
        if self.debug {
            EnvFilter::default().add_directive(LevelFilter::DEBUG.into())
        } else {
            self.log_level.as_env_filter()
        }
    }
}

impl Default for LoggingConfiguration {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debug: false,
            log_format_json: false,
        }
    }
}

/// A log level, expressed as `EnvFilter` directives.
#[derive(Deserialize)]
#[serde(try_from = "String")]
pub struct LogLevel(EnvFilter);

impl LogLevel {
    /// Returns a copy of the underlying filter.
    pub fn as_env_filter(&self) -> EnvFilter {
        self.0.clone()
    }
}

impl From<LevelFilter> for LogLevel {
    fn from(level: LevelFilter) -> Self {
        Self(EnvFilter::default().add_directive(level.into()))
    }
}

impl TryFrom<String> for LogLevel {
    type Error = GenericError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        // An unset level is passed through as an empty string.
        if value.trim().is_empty() {
            return Ok(default_log_level());
        }

        EnvFilter::builder()
            .parse(&value)
            .map(Self)
            .with_error_context(|| format!("Invalid log level '{}'.", value))
    }
}
