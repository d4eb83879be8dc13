//! HTTP write client.

use std::{fmt, net::Ipv6Addr, time::Duration};

use bytes::Bytes;
use fluxgate_error::{generic_error, GenericError};
use fluxgate_event::Batch;
use fluxgate_tls::ClientTLSConfigBuilder;
use headers::{authorization::Basic, Authorization, HeaderMapExt as _};
use http::{header::CONTENT_TYPE, HeaderValue, Method, Request, Uri};
use http_body_util::{BodyExt as _, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use rustls::RootCertStore;
use serde::Deserialize;
use snafu::ResultExt as _;
use tracing::debug;
use url::Url;

use super::{BuildRequest, Encode, InvalidEndpoint, ReadResponse, SendRequest, TransportError};
use crate::ser::line_protocol::LineProtocolEncoder;

const LINE_PROTOCOL_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Builds the base URL of a store listening at `host:port`.
///
/// IPv6 literals are bracketed.
///
/// # Errors
///
/// If the resulting URL is invalid, an error is returned.
pub fn endpoint_url(scheme: &str, host: &str, port: u16) -> Result<Url, url::ParseError> {
    let host = if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]", host)
    } else {
        host.to_string()
    };

    Url::parse(&format!("{}://{}:{}", scheme, host, port))
}

/// An HTTP write client.
///
/// Writes batches to the store's `/write` endpoint as line protocol. Connections are pooled and reused across writes,
/// so a single client should be kept for as long as the target endpoint stays the same.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    write_url: Url,
    authorization: Option<Authorization<Basic>>,
}

impl HttpClient {
    /// Creates a new builder for configuring an HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Returns the URL batches are written to, without query parameters.
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    /// Writes a batch.
    ///
    /// The database, retention policy (when set), and precision of the batch are passed as query parameters. The batch is
    /// accepted or rejected by the store as a whole.
    ///
    /// # Errors
    ///
    /// If the batch cannot be encoded, the request fails, or the store responds with a non-success status, an error is
    /// returned.
    pub async fn write(&self, batch: &Batch) -> Result<(), TransportError> {
        let lines = LineProtocolEncoder::new(batch.precision())
            .encode_batch(batch)
            .context(Encode)?;

        let mut url = self.write_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("db", batch.database());
            if !batch.retention_policy().is_empty() {
                query.append_pair("rp", batch.retention_policy());
            }
            query.append_pair("precision", batch.precision().as_token());
        }
        let uri = url
            .as_str()
            .parse::<Uri>()
            .context(InvalidEndpoint { endpoint: url.as_str() })?;

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, HeaderValue::from_static(LINE_PROTOCOL_CONTENT_TYPE))
            .body(Full::new(Bytes::from(lines.join("\n"))))
            .context(BuildRequest)?;
        if let Some(authorization) = &self.authorization {
            request.headers_mut().typed_insert(authorization.clone());
        }

        let response = self.inner.request(request).await.context(SendRequest)?;
        let status = response.status();
        if status.is_success() {
            debug!(points = batch.len(), %status, "Wrote batch.");
            return Ok(());
        }

        let body = response.into_body().collect().await.context(ReadResponse)?.to_bytes();
        Err(TransportError::UnexpectedStatus {
            status,
            body: error_message(&body),
        })
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("write_url", &self.write_url.as_str())
            .field("authenticated", &self.authorization.is_some())
            .finish()
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

// The store reports errors as `{"error": "..."}`, but proxies in front of it may not.
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(response) => response.error,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP client builder.
///
/// # Defaults
///
/// - 30 second connect timeout
/// - connection pool with a 45 second idle timeout and at most 5 idle connections per host
/// - HTTPS server certificates are validated against the platform's root certificates
/// - no authentication
#[derive(Clone)]
pub struct HttpClientBuilder {
    tls_builder: ClientTLSConfigBuilder,
    authorization: Option<Authorization<Basic>>,
}

impl HttpClientBuilder {
    /// Sets the TLS configuration.
    ///
    /// Only used when the endpoint is HTTPS.
    pub fn with_tls_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ClientTLSConfigBuilder) -> ClientTLSConfigBuilder,
    {
        self.tls_builder = f(self.tls_builder);
        self
    }

    /// Sets the credentials sent with every write, using HTTP Basic authentication.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.authorization = Some(Authorization::basic(username, password));
        self
    }

    /// Builds the `HttpClient` for the store at `endpoint`.
    ///
    /// # Errors
    ///
    /// If the endpoint scheme is not `http` or `https`, or the TLS configuration cannot be built, an error is returned.
    pub fn build(self, endpoint: &Url) -> Result<HttpClient, GenericError> {
        // Plain HTTP still goes through the HTTPS-capable connector, but never needs any roots.
        let tls_builder = match endpoint.scheme() {
            "https" => self.tls_builder,
            "http" => self.tls_builder.with_root_cert_store(RootCertStore::empty()),
            other => return Err(generic_error!("unsupported HTTP scheme '{}'", other)),
        };
        let tls_config = tls_builder.build()?;

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(Some(CONNECT_TIMEOUT));

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_all_versions()
            .wrap_connector(http_connector);

        let inner = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(45))
            .pool_timer(TokioTimer::new())
            .build(connector);

        let mut write_url = endpoint.clone();
        write_url.set_path("/write");
        write_url.set_query(None);

        Ok(HttpClient {
            inner,
            write_url,
            authorization: self.authorization,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            tls_builder: ClientTLSConfigBuilder::new(),
            authorization: None,
        }
    }
}
