//! Transport Layer Security (TLS) configuration and helpers.

use std::sync::{Arc, Mutex, OnceLock};

use fluxgate_error::{generic_error, GenericError};
use rustls::{
    client::{
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        Resumption,
    },
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use tracing::{debug, warn};

/// Default root certificate store to use for TLS when one isn't explicitly provided.
static DEFAULT_ROOT_CERT_STORE_MUTEX: Mutex<()> = Mutex::new(());
static DEFAULT_ROOT_CERT_STORE: OnceLock<Arc<RootCertStore>> = OnceLock::new();

/// TLS 1.2 sessions cached for resumption.
const MAX_TLS12_RESUMPTION_SESSIONS: usize = 8;

/// A TLS client configuration builder.
///
/// Exposes the handful of options a store client needs and provides sane defaults for everything else.
#[derive(Clone, Default)]
pub struct ClientTLSConfigBuilder {
    root_cert_store: Option<RootCertStore>,
    skip_verify: bool,
}

impl ClientTLSConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root certificate store to use for the client.
    ///
    /// Defaults to the root certificate store loaded from the platform. (See [`load_platform_root_certificates`].)
    pub fn with_root_cert_store(mut self, store: RootCertStore) -> Self {
        self.root_cert_store = Some(store);
        self
    }

    /// Disables verification of the server's certificate chain and hostname.
    ///
    /// Handshake signatures are still checked, so the connection is encrypted, but the peer is not authenticated.
    pub fn with_skip_verify(mut self, skip_verify: bool) -> Self {
        self.skip_verify = skip_verify;
        self
    }

    /// Builds the client TLS configuration.
    ///
    /// When certificate verification is enabled and no root certificate store was provided, the platform's root
    /// certificates are loaded on first use.
    ///
    /// # Errors
    ///
    /// If the platform root certificates are needed but could not be loaded, an error will be returned.
    pub fn build(self) -> Result<ClientConfig, GenericError> {
        let mut config = if self.skip_verify {
            warn!("TLS certificate verification is disabled. Server identity will not be checked.");

            let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoCertificateVerification { provider }))
                .with_no_client_auth()
        } else {
            let root_cert_store = match self.root_cert_store {
                Some(store) => Arc::new(store),
                None => default_root_cert_store()?,
            };

            ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth()
        };

        config.resumption = Resumption::in_memory_sessions(MAX_TLS12_RESUMPTION_SESSIONS);

        Ok(config)
    }
}

fn default_root_cert_store() -> Result<Arc<RootCertStore>, GenericError> {
    if let Some(store) = DEFAULT_ROOT_CERT_STORE.get() {
        return Ok(Arc::clone(store));
    }

    if let Err(e) = load_platform_root_certificates() {
        // Another caller may have initialized the store in the meantime.
        if DEFAULT_ROOT_CERT_STORE.get().is_none() {
            return Err(e);
        }
    }

    DEFAULT_ROOT_CERT_STORE
        .get()
        .map(Arc::clone)
        .ok_or_else(|| generic_error!("Default TLS root certificate store not initialized."))
}

/// Initializes the default root certificate store from the platform's native certificate store.
///
/// ## Environment Variables
///
/// | Environment Variable | Description                                                                           |
/// |----------------------|---------------------------------------------------------------------------------------|
/// | SSL_CERT_FILE        | File containing an arbitrary number of certificates in PEM format.                    |
/// | SSL_CERT_DIR         | Directory utilizing the hierarchy and naming convention used by OpenSSL's `c_rehash`. |
///
/// If **either** (or **both**) are set, certificates are only loaded from the locations specified via environment
/// variables and not the platform-native certificate store.
///
/// # Errors
///
/// If the store was already initialized, or no certificates could be loaded, an error will be returned.
pub fn load_platform_root_certificates() -> Result<(), GenericError> {
    let _guard = DEFAULT_ROOT_CERT_STORE_MUTEX
        .lock()
        .map_err(|_| generic_error!("Default TLS root certificate store update lock poisoned."))?;
    if DEFAULT_ROOT_CERT_STORE.get().is_some() {
        return Err(generic_error!("Default TLS root certificate store already initialized."));
    }

    let mut root_cert_store = RootCertStore::empty();

    let result = rustls_native_certs::load_native_certs();
    if !result.errors.is_empty() {
        let joined_errors = result
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        return Err(generic_error!(
            "Failed to load certificates from platform's native certificate store: {}",
            joined_errors
        ));
    }

    let (added, failed) = root_cert_store.add_parsable_certificates(result.certs);
    if added == 0 {
        return Err(generic_error!(
            "Failed to add any certificates from the platform to the default root certificate store."
        ));
    }

    debug!(added, failed, "Loaded platform root certificates.");

    // Only ever set here, while holding the mutex, after checking it was unset.
    let _ = DEFAULT_ROOT_CERT_STORE.set(Arc::new(root_cert_store));

    Ok(())
}

/// Accepts any server certificate while still validating handshake signatures.
#[derive(Debug)]
struct NoCertificateVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self, _end_entity: &CertificateDer<'_>, _intermediates: &[CertificateDer<'_>], _server_name: &ServerName<'_>,
        _ocsp_response: &[u8], _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self, message: &[u8], cert: &CertificateDer<'_>, dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self, message: &[u8], cert: &CertificateDer<'_>, dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_store_builds() {
        let config = ClientTLSConfigBuilder::new()
            .with_root_cert_store(RootCertStore::empty())
            .build()
            .expect("should build with an explicit root store");

        assert!(config.alpn_protocols.is_empty());
    }

    #[test]
    fn skip_verify_accepts_any_certificate() {
        let verifier = NoCertificateVerification {
            provider: Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
        };
        let server_name = ServerName::try_from("influx.invalid").unwrap();

        let verified = verifier.verify_server_cert(
            &CertificateDer::from(vec![0u8; 8]),
            &[],
            &server_name,
            &[],
            UnixTime::now(),
        );
        assert!(verified.is_ok());
        assert!(!verifier.supported_verify_schemes().is_empty());
    }

    #[test]
    fn skip_verify_builds_without_platform_roots() {
        assert!(ClientTLSConfigBuilder::new().with_skip_verify(true).build().is_ok());
    }
}
