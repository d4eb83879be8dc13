//! Payload decoding.
use std::{collections::HashMap, fmt, sync::Arc};

use fluxgate_error::GenericError;
use fluxgate_event::Metric;
use snafu::Snafu;

mod json;
pub use self::json::{JsonDecoder, CONTENT_TYPE_JSON};

/// A decode error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum DecodeError {
    /// No decoder is registered for the content type.
    #[snafu(display("unsupported content type '{}'", content_type))]
    UnsupportedContentType {
        /// Content type of the payload.
        content_type: String,
    },

    /// The payload was not valid JSON, or did not describe a list of metrics.
    #[snafu(display("failed to decode JSON payload: {}", source))]
    Json {
        /// Error source.
        source: serde_json::Error,
    },

    /// A registered decoder failed.
    #[snafu(display("failed to decode '{}' payload: {}", content_type, source))]
    Decoder {
        /// Content type of the payload.
        content_type: String,

        /// Error source.
        source: GenericError,
    },
}

/// Decodes an encoded payload into an ordered list of metrics.
pub trait MetricDecoder: fmt::Debug + Send + Sync {
    /// Decodes `payload`.
    ///
    /// Metrics are returned in the order they appear in the payload.
    ///
    /// # Errors
    ///
    /// If the payload is malformed, an error is returned.
    fn decode(&self, payload: &[u8]) -> Result<Vec<Metric>, DecodeError>;
}

/// A set of decoders keyed by content type.
///
/// The default registry knows about [`CONTENT_TYPE_JSON`]. Additional decoders can be registered at any time before the
/// registry is shared.
#[derive(Clone, Debug)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn MetricDecoder>>,
}

impl DecoderRegistry {
    /// Creates a registry with no decoders.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `decoder` for `content_type`, returning the decoder it replaced, if any.
    pub fn register<S, D>(&mut self, content_type: S, decoder: D) -> Option<Arc<dyn MetricDecoder>>
    where
        S: Into<String>,
        D: MetricDecoder + 'static,
    {
        self.decoders.insert(content_type.into(), Arc::new(decoder))
    }

    /// Returns `true` if a decoder is registered for `content_type`.
    pub fn supports(&self, content_type: &str) -> bool {
        self.decoders.contains_key(content_type)
    }

    /// Returns the registered content types, in no particular order.
    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }

    /// Decodes `payload` with the decoder registered for `content_type`.
    ///
    /// # Errors
    ///
    /// If no decoder is registered for `content_type`, or the decoder fails, an error is returned.
    pub fn decode(&self, content_type: &str, payload: &[u8]) -> Result<Vec<Metric>, DecodeError> {
        match self.decoders.get(content_type) {
            Some(decoder) => decoder.decode(payload),
            None => UnsupportedContentType { content_type }.fail(),
        }
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(CONTENT_TYPE_JSON, JsonDecoder);
        registry
    }
}
