use std::{fmt, sync::Arc};

use fluxgate_config::GenericConfiguration;
use fluxgate_error::GenericError;
use fluxgate_io::{
    deser::{DecodeError, DecoderRegistry},
    net::client::TransportError,
};
use metrics::counter;
use snafu::{ResultExt as _, Snafu};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    batch::BatchAssembler,
    config::{PublisherConfiguration, PublisherConfigurationError},
    point::BuildError,
    transport::ClientRegistry,
};

/// Broad classification of a publish failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The payload was malformed or of an unsupported content type.
    Decode,

    /// The options or the metrics were structurally invalid.
    Resolution,

    /// The store could not be reached, or rejected the write.
    Transport,

    /// The caller cancelled the publish call.
    Cancelled,
}

impl ErrorKind {
    /// Returns the name of the error kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Resolution => "resolution",
            Self::Transport => "transport",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A publish error.
///
/// Every stage of a publish call stops at its first error, which is returned as-is. Nothing is retried.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum PublishError {
    /// The payload could not be decoded.
    #[snafu(display("failed to decode payload: {}", source))]
    Decode {
        /// Error source.
        source: DecodeError,
    },

    /// The options could not be resolved into a configuration.
    #[snafu(display("invalid configuration: {}", source))]
    Configuration {
        /// Error source.
        source: PublisherConfigurationError,
    },

    /// A metric could not be turned into a point.
    #[snafu(display("failed to build points: {}", source))]
    Build {
        /// Error source.
        source: BuildError,
    },

    /// The transport client could not be created.
    #[snafu(display("failed to create transport client: {}", source))]
    CreateTransport {
        /// Error source.
        source: GenericError,
    },

    /// The batch could not be written.
    #[snafu(display("failed to write batch: {}", source))]
    Write {
        /// Error source.
        source: TransportError,
    },

    /// The publish call was cancelled before the write completed.
    #[snafu(display("publish cancelled"))]
    Cancelled,
}

impl PublishError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Configuration { .. } | Self::Build { .. } => ErrorKind::Resolution,
            Self::CreateTransport { .. } | Self::Write { .. } => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Publishes metrics to the store.
///
/// A publish call decodes the payload, resolves the options into a [`PublisherConfiguration`], looks up (or creates)
/// the transport client for its connection parameters, assembles the metrics into a batch, and writes the batch in one
/// call. All state is local to the call except the transport clients, which live in the shared [`ClientRegistry`].
///
/// `Publisher` is cheap to clone, and clones share both their decoders and their client registry, so it can be handed
/// to any number of concurrent callers.
#[derive(Clone, Debug, Default)]
pub struct Publisher {
    decoders: Arc<DecoderRegistry>,
    registry: Arc<ClientRegistry>,
}

impl Publisher {
    /// Creates a new `Publisher` with the given decoders and client registry.
    pub fn new(decoders: DecoderRegistry, registry: Arc<ClientRegistry>) -> Self {
        Self {
            decoders: Arc::new(decoders),
            registry,
        }
    }

    /// Returns the decoders.
    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    /// Returns the client registry.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Publishes an encoded batch of metrics.
    ///
    /// # Errors
    ///
    /// If any stage fails, the first error encountered is returned. See [`PublishError::kind`] for how errors are
    /// classified.
    pub async fn publish(
        &self, content_type: &str, payload: &[u8], options: &GenericConfiguration,
    ) -> Result<(), PublishError> {
        self.publish_with_cancellation(content_type, payload, options, CancellationToken::new())
            .await
    }

    /// Publishes an encoded batch of metrics, giving up if `cancel` is triggered before the write completes.
    ///
    /// Cancellation only interrupts the write itself: any datagrams or bytes already handed to the operating system
    /// are not recalled.
    ///
    /// # Errors
    ///
    /// If any stage fails, the first error encountered is returned. If `cancel` is triggered first,
    /// [`PublishError::Cancelled`] is returned.
    pub async fn publish_with_cancellation(
        &self, content_type: &str, payload: &[u8], options: &GenericConfiguration, cancel: CancellationToken,
    ) -> Result<(), PublishError> {
        counter!("fluxgate_publish_calls_total").increment(1);

        let result = self.run(content_type, payload, options, &cancel).await;
        if let Err(e) = &result {
            counter!("fluxgate_publish_errors_total", "kind" => e.kind().as_str()).increment(1);
            warn!(error = %e, kind = %e.kind(), content_type, "Failed to publish metrics.");
        }

        result
    }

    async fn run(
        &self, content_type: &str, payload: &[u8], options: &GenericConfiguration, cancel: &CancellationToken,
    ) -> Result<(), PublishError> {
        let metrics = self.decoders.decode(content_type, payload).context(Decode)?;
        let config = PublisherConfiguration::from_configuration(options).context(Configuration)?;
        let transport = self
            .registry
            .get_or_create(&config.connection_key())
            .await
            .context(CreateTransport)?;
        let batch = BatchAssembler::from_configuration(&config)
            .assemble(&metrics)
            .context(Build)?;

        let kind = transport.kind();
        if batch.is_empty() {
            debug!(transport = %kind, "No metrics to publish.");
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            result = transport.write(&batch) => result.context(Write)?,
        }

        counter!("fluxgate_points_written_total", "transport" => kind.as_str()).increment(batch.len() as u64);
        debug!(
            metrics = metrics.len(),
            points = batch.len(),
            transport = %kind,
            database = batch.database(),
            "Published metrics."
        );

        Ok(())
    }
}
