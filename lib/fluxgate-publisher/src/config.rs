use std::{fmt, str::FromStr};

use fluxgate_config::{ConfigurationError, GenericConfiguration};
use fluxgate_event::{precision::UnknownPrecision, Precision};
use snafu::{ResultExt as _, Snafu};

use crate::transport::{ConnectionKey, TransportKind};

const DEFAULT_PORT: u16 = 8086;
const DEFAULT_RETENTION: &str = "autogen";
const DEFAULT_PRECISION: &str = "s";

/// A publisher configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum PublisherConfigurationError {
    /// An option could not be read.
    #[snafu(display("failed to read option: {}", source))]
    Configuration {
        /// Error source.
        source: ConfigurationError,
    },

    /// A required option was missing or empty.
    #[snafu(display("missing required option '{}'", option))]
    MissingOption {
        /// Name of the option.
        option: &'static str,
    },

    /// The scheme is not one of the supported transports.
    #[snafu(display("unknown scheme '{}' (expected one of \"\", http, https, udp)", scheme))]
    UnknownScheme {
        /// Configured scheme.
        scheme: String,
    },

    /// The precision is not a recognized token.
    #[snafu(display("invalid precision: {}", source))]
    InvalidPrecision {
        /// Error source.
        source: UnknownPrecision,
    },

    /// An explicit scheme was configured without a port.
    #[snafu(display("option 'port' is required when scheme is '{}'", scheme))]
    MissingPort {
        /// Configured scheme.
        scheme: Scheme,
    },
}

/// Transport scheme.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Scheme {
    /// No scheme configured: plain HTTP on the store's default port.
    #[default]
    Default,

    /// Plain HTTP.
    Http,

    /// HTTP over TLS.
    Https,

    /// UDP.
    Udp,
}

impl Scheme {
    /// Returns the scheme as it appears in configuration.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Http => "http",
            Self::Https => "https",
            Self::Udp => "udp",
        }
    }

    /// Returns the URL scheme used to reach the store.
    pub const fn url_scheme(&self) -> &'static str {
        match self {
            Self::Default | Self::Http => "http",
            Self::Https => "https",
            Self::Udp => "udp",
        }
    }

    /// Returns the kind of transport this scheme is served by.
    pub const fn transport_kind(&self) -> TransportKind {
        match self {
            Self::Default | Self::Http | Self::Https => TransportKind::Http,
            Self::Udp => TransportKind::Udp,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = PublisherConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Self::Default),
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "udp" => Ok(Self::Udp),
            _ => UnknownScheme { scheme: s }.fail(),
        }
    }
}

/// Publisher configuration.
///
/// Resolved once per publish call from the host-provided options, and never modified afterwards.
///
/// | option | default |
/// |---|---|
/// | `host` | required |
/// | `port` | `8086` when `scheme` is empty, otherwise required |
/// | `scheme` | `""` |
/// | `skip-verify` | `false` |
/// | `user` / `password` | `""` |
/// | `database` | required |
/// | `retention` | `autogen` |
/// | `precision` | `s` |
/// | `isMultiFields` | `false` |
/// | `debug` | `false` |
/// | `log-level` | `""` |
#[derive(Clone, PartialEq)]
pub struct PublisherConfiguration {
    host: String,
    port: u16,
    scheme: Scheme,
    skip_verify: bool,
    user: String,
    password: String,
    database: String,
    retention: String,
    precision: Precision,
    multi_fields: bool,
    debug: bool,
    log_level: String,
}

impl PublisherConfiguration {
    /// Creates a new `PublisherConfiguration` from the given configuration.
    ///
    /// # Errors
    ///
    /// If a required option is missing, or an option holds an invalid value, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, PublisherConfigurationError> {
        let host = required_string(config, "host")?;
        let database = required_string(config, "database")?;

        let scheme = optional::<String>(config, "scheme")?
            .unwrap_or_default()
            .parse::<Scheme>()?;
        let port = match optional::<u16>(config, "port")? {
            Some(port) => port,
            None if scheme == Scheme::Default => DEFAULT_PORT,
            None => return MissingPort { scheme }.fail(),
        };

        let precision = optional::<String>(config, "precision")?
            .unwrap_or_else(|| DEFAULT_PRECISION.to_string())
            .parse::<Precision>()
            .context(InvalidPrecision)?;

        Ok(Self {
            host,
            port,
            scheme,
            skip_verify: optional(config, "skip-verify")?.unwrap_or(false),
            user: optional(config, "user")?.unwrap_or_default(),
            password: optional(config, "password")?.unwrap_or_default(),
            database,
            retention: optional(config, "retention")?.unwrap_or_else(|| DEFAULT_RETENTION.to_string()),
            precision,
            multi_fields: optional(config, "isMultiFields")?.unwrap_or(false),
            debug: optional(config, "debug")?.unwrap_or(false),
            log_level: optional(config, "log-level")?.unwrap_or_default(),
        })
    }

    /// Returns the store host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the store port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the transport scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns `true` if TLS server certificates should not be verified.
    pub fn skip_verify(&self) -> bool {
        self.skip_verify
    }

    /// Returns the user to authenticate as, which may be empty.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the target database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the target retention policy.
    pub fn retention(&self) -> &str {
        &self.retention
    }

    /// Returns the timestamp precision.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Returns `true` if sibling metrics are merged into multi-field points.
    pub fn multi_fields(&self) -> bool {
        self.multi_fields
    }

    /// Returns `true` if debug logging was requested.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the requested log level, which may be empty.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Returns the key identifying the transport client for this configuration.
    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey::new(self.scheme, &self.host, self.port)
            .with_credentials(&self.user, &self.password)
            .with_skip_verify(self.skip_verify)
    }
}

impl fmt::Debug for PublisherConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherConfiguration")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("skip_verify", &self.skip_verify)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("retention", &self.retention)
            .field("precision", &self.precision)
            .field("multi_fields", &self.multi_fields)
            .field("debug", &self.debug)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn optional<T>(config: &GenericConfiguration, key: &str) -> Result<Option<T>, PublisherConfigurationError>
where
    T: serde::de::DeserializeOwned,
{
    config.try_get_typed(key).context(Configuration)
}

fn required_string(config: &GenericConfiguration, key: &'static str) -> Result<String, PublisherConfigurationError> {
    match optional::<String>(config, key)? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => MissingOption { option: key }.fail(),
    }
}
