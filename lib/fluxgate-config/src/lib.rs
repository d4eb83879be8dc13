//! Layered configuration.
//!
//! Options are gathered from any mix of files, prefixed environment variables, and in-memory values, merged in the
//! order they were added, and then either deserialized wholesale or queried key by key.
#![deny(missing_docs)]

use std::{borrow::Cow, path::Path, sync::Arc};

pub use figment::value;
use figment::{error::Kind, Figment};
use fluxgate_error::GenericError;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

mod provider;
use self::provider::{normalize_key, ResolvedProvider};

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// An environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// A required key was not set by any source.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// How to set the key, including the environment variable name when environment variables were loaded.
        help_text: String,

        /// Name of the missing key.
        field: Cow<'static, str>,
    },

    /// A key was set, but to a value of the wrong type.
    #[snafu(display("Expected '{}' to be {}, got {} instead.", field, expected_ty, actual_ty))]
    InvalidFieldType {
        /// Period-separated path of the key.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Any other failure to read or query configuration.
    #[snafu(display("Failed to query configuration: {}", source))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

impl ConfigurationError {
    fn from_figment(env_prefix: Option<&str>, e: figment::Error) -> Self {
        match e.kind {
            Kind::MissingField(field) => {
                let help_text = match env_prefix {
                    Some(prefix) => format!("Try setting `{}` or `{}`.", field, env_var_name(prefix, &field)),
                    None => format!("Try setting `{}`.", field),
                };
                Self::MissingField { help_text, field }
            }
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e.into() },
        }
    }
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        Self::from_figment(None, e)
    }
}

/// Environment variable that sets `key`, given a normalized (uppercase, `_`-terminated) prefix.
fn env_var_name(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key.replace(['.', '-'], "_").to_uppercase())
}

/// Builds a [`GenericConfiguration`] from one or more sources.
///
/// Sources added later take precedence over sources added earlier, key by key. Keys are case-insensitive and treat `-`
/// and `_` as the same character, so `skip-verify` in a file and `FLUXGATE_SKIP_VERIFY` in the environment set the same
/// option.
///
/// ```no_run
/// # use fluxgate_config::ConfigurationLoader;
/// # fn main() -> Result<(), fluxgate_config::ConfigurationError> {
/// let config = ConfigurationLoader::default()
///     .from_yaml("/etc/fluxgate/publisher.yaml")?
///     .from_environment("fluxgate")?
///     .into_generic();
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ConfigurationLoader {
    env_prefix: Option<String>,
    providers: Vec<ResolvedProvider>,
}

impl ConfigurationLoader {
    fn push(mut self, provider: ResolvedProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Adds a YAML file.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or is not valid YAML, an error will be returned.
    pub fn from_yaml<P>(self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let provider = ResolvedProvider::from_yaml(path.as_ref())
            .map_err(GenericError::from)
            .context(Generic)?;
        Ok(self.push(provider))
    }

    /// Adds a YAML file if it can be read, and otherwise leaves the loader unchanged.
    pub fn try_from_yaml<P>(self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        match ResolvedProvider::from_yaml(path.as_ref()) {
            Ok(provider) => self.push(provider),
            Err(e) => {
                debug!(error = %e, path = %path.as_ref().display(), "Skipping unreadable YAML configuration file.");
                self
            }
        }
    }

    /// Adds a JSON file.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or is not valid JSON, an error will be returned.
    pub fn from_json<P>(self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let provider = ResolvedProvider::from_json(path.as_ref())
            .map_err(GenericError::from)
            .context(Generic)?;
        Ok(self.push(provider))
    }

    /// Adds the environment variables starting with `prefix`.
    ///
    /// The prefix is matched case-insensitively, and an underscore is appended unless it already ends with one. The
    /// rest of each variable name forms the key, so with a prefix of `fluxgate`, `FLUXGATE_SKIP_VERIFY` sets
    /// `skip-verify`.
    ///
    /// Values are strings. They are read as numbers or booleans only where the option is a number or a boolean.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, or the environment cannot be read, an error will be returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let mut prefix = prefix.to_uppercase();
        if !prefix.ends_with('_') {
            prefix.push('_');
        }

        let provider = ResolvedProvider::from_environment(&prefix)?;
        self.env_prefix = Some(prefix);
        Ok(self.push(provider))
    }

    /// Adds in-memory values.
    ///
    /// Anything that serializes to a map is accepted: a struct, a `HashMap`, a JSON object.
    ///
    /// # Errors
    ///
    /// If the values do not serialize to a map, an error will be returned.
    pub fn from_values<T>(self, values: T) -> Result<Self, ConfigurationError>
    where
        T: Serialize,
    {
        let provider = ResolvedProvider::from_serialized(values)?;
        Ok(self.push(provider))
    }

    fn build_figment(&self) -> Figment {
        self.providers
            .iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider))
    }

    /// Merges all sources and deserializes the result as `T`.
    ///
    /// # Errors
    ///
    /// If the merged configuration cannot be deserialized as `T`, an error will be returned.
    pub fn into_typed<'a, T>(self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.build_figment()
            .extract_lossy()
            .map_err(|e| ConfigurationError::from_figment(self.env_prefix.as_deref(), e))
    }

    /// Merges all sources into a [`GenericConfiguration`].
    pub fn into_generic(self) -> GenericConfiguration {
        let figment = self.build_figment();

        GenericConfiguration {
            inner: Arc::new(Inner {
                figment,
                env_prefix: self.env_prefix,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    env_prefix: Option<String>,
}

/// Merged configuration, queryable by key.
///
/// Keys are period-separated paths (`a.b.c`), matched the same way the loader merges them. Numbers and booleans given
/// as strings are accepted where the requested type is a number or a boolean.
///
/// Clones share the same immutable data.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner
            .figment
            .extract_inner_lossy(&normalize_key(key))
            .map_err(|e| ConfigurationError::from_figment(self.inner.env_prefix.as_deref(), e))
    }

    /// Gets the value of `key`.
    ///
    /// # Errors
    ///
    /// If the key is not set, or its value cannot be deserialized as `T`, an error will be returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.get(key)
    }

    /// Gets the value of `key`, falling back to `T::default()` on any error.
    pub fn get_typed_or_default<'a, T>(&self, key: &str) -> T
    where
        T: Default + Deserialize<'a>,
    {
        self.get(key).unwrap_or_default()
    }

    /// Gets the value of `key`, or `None` if it is not set.
    ///
    /// # Errors
    ///
    /// If the key is set but its value cannot be deserialized as `T`, an error will be returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deserializes the whole configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be deserialized as `T`, an error will be returned.
    pub fn as_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner
            .figment
            .extract_lossy()
            .map_err(|e| ConfigurationError::from_figment(self.inner.env_prefix.as_deref(), e))
    }
}
