//! Transport dispatch.
//!
//! Each distinct set of connection parameters gets one long-lived transport client, created on first use and shared by
//! every publish call that targets the same store afterwards. The [`ClientRegistry`] owns that mapping, and delegates
//! client creation to a [`TransportFactory`] so that the clients themselves can be substituted.
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use fluxgate_error::{generic_error, ErrorContext as _, GenericError};
use fluxgate_event::Batch;
use fluxgate_io::net::client::{
    http::{endpoint_url, HttpClient},
    udp::UdpClient,
    TransportError,
};
use metrics::counter;
use tracing::debug;

use crate::config::Scheme;

/// Kind of transport.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TransportKind {
    /// HTTP or HTTPS.
    Http,

    /// UDP.
    Udp,
}

impl TransportKind {
    /// Returns the name of the transport kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport that delivers batches to the store.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the kind of this transport.
    fn kind(&self) -> TransportKind;

    /// Writes a batch in a single call.
    ///
    /// The batch is delivered or rejected as a whole. For connectionless transports, success only means the batch left
    /// this process.
    ///
    /// # Errors
    ///
    /// If the batch could not be delivered, an error is returned.
    async fn write(&self, batch: &Batch) -> Result<(), TransportError>;
}

#[async_trait]
impl Transport for HttpClient {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn write(&self, batch: &Batch) -> Result<(), TransportError> {
        HttpClient::write(self, batch).await
    }
}

#[async_trait]
impl Transport for UdpClient {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    async fn write(&self, batch: &Batch) -> Result<(), TransportError> {
        UdpClient::write(self, batch).await
    }
}

/// Connection parameters identifying a transport client.
///
/// Two publish calls share a client exactly when their keys are equal.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct ConnectionKey {
    scheme: Scheme,
    host: String,
    port: u16,
    user: String,
    password: String,
    skip_verify: bool,
}

impl ConnectionKey {
    /// Creates a new `ConnectionKey` with no credentials and certificate verification enabled.
    pub fn new(scheme: Scheme, host: &str, port: u16) -> Self {
        Self {
            scheme,
            host: host.to_string(),
            port,
            user: String::new(),
            password: String::new(),
            skip_verify: false,
        }
    }

    /// Sets the credentials.
    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.user = user.to_string();
        self.password = password.to_string();
        self
    }

    /// Sets whether TLS server certificates are verified.
    pub fn with_skip_verify(mut self, skip_verify: bool) -> Self {
        self.skip_verify = skip_verify;
        self
    }

    /// Returns the scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the user, which may be empty.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the password, which may be empty.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns `true` if TLS server certificates are not verified.
    pub fn skip_verify(&self) -> bool {
        self.skip_verify
    }
}

impl fmt::Debug for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionKey")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("skip_verify", &self.skip_verify)
            .finish()
    }
}

/// Creates transport clients.
pub trait TransportFactory: Send + Sync {
    /// Creates a transport client for `key`.
    ///
    /// # Errors
    ///
    /// If the client cannot be created, an error is returned.
    fn create(&self, key: &ConnectionKey) -> Result<Arc<dyn Transport>, GenericError>;
}

/// Creates [`HttpClient`]s for the HTTP schemes and [`UdpClient`]s for UDP.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn create(&self, key: &ConnectionKey) -> Result<Arc<dyn Transport>, GenericError> {
        match key.scheme().transport_kind() {
            TransportKind::Udp => Ok(Arc::new(UdpClient::new(key.host(), key.port()))),
            TransportKind::Http => {
                let endpoint = endpoint_url(key.scheme().url_scheme(), key.host(), key.port())
                    .with_error_context(|| format!("Invalid store address '{}:{}'.", key.host(), key.port()))?;

                let mut builder = HttpClient::builder().with_tls_config(|tls| tls.with_skip_verify(key.skip_verify()));
                if !key.user().is_empty() {
                    builder = builder.with_basic_auth(key.user(), key.password());
                }

                Ok(Arc::new(builder.build(&endpoint)?))
            }
        }
    }
}

/// A registry of long-lived transport clients, keyed by connection parameters.
///
/// Creations are serialized, so concurrent callers with the same key always end up sharing a single client. Lookups of
/// existing clients only take a short map lock and never wait on a creation in progress.
pub struct ClientRegistry {
    factory: Arc<dyn TransportFactory>,
    clients: Mutex<HashMap<ConnectionKey, Arc<dyn Transport>>>,
    creating: tokio::sync::Mutex<()>,
}

impl ClientRegistry {
    /// Creates a new, empty `ClientRegistry` that creates clients with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: TransportFactory + 'static,
    {
        Self {
            factory: Arc::new(factory),
            clients: Mutex::new(HashMap::new()),
            creating: tokio::sync::Mutex::new(()),
        }
    }

    fn lookup(&self, key: &ConnectionKey) -> Option<Arc<dyn Transport>> {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(Arc::clone)
    }

    /// Gets the client for `key`, creating it if it does not exist yet.
    ///
    /// Creating a client may block, for example to load the platform's root certificates for the first HTTPS client,
    /// so the factory runs on the blocking thread pool rather than on the calling task's worker thread.
    ///
    /// # Errors
    ///
    /// If the client does not exist and cannot be created, an error is returned. Nothing is cached in that case.
    pub async fn get_or_create(&self, key: &ConnectionKey) -> Result<Arc<dyn Transport>, GenericError> {
        if let Some(client) = self.lookup(key) {
            return Ok(client);
        }

        let _creating = self.creating.lock().await;
        if let Some(client) = self.lookup(key) {
            return Ok(client);
        }

        let factory = Arc::clone(&self.factory);
        let owned_key = key.clone();
        let client = tokio::task::spawn_blocking(move || factory.create(&owned_key))
            .await
            .map_err(|e| generic_error!("Transport client creation did not complete: {}", e))??;

        let kind = client.kind();
        counter!("fluxgate_transport_clients_created_total", "transport" => kind.as_str()).increment(1);
        debug!(transport = %kind, host = key.host(), port = key.port(), "Created transport client.");

        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), Arc::clone(&client));
        Ok(client)
    }

    /// Returns the number of clients in the registry.
    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if the registry holds no clients.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(DefaultTransportFactory)
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry").field("clients", &self.len()).finish()
    }
}
