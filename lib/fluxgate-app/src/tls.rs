//! TLS.

use fluxgate_error::{generic_error, GenericError};

/// Initializes the TLS subsystem.
///
/// This installs AWS-LC as the process-wide cryptography provider, so that every TLS configuration built afterwards
/// agrees on the provider regardless of which crate features happen to be enabled.
///
/// ## Errors
///
/// If the TLS subsystem was already initialized, an error will be returned.
pub fn initialize_tls() -> Result<(), GenericError> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| {
            generic_error!(
                "Failed to install AWS-LC as default cryptography provider. This is likely due to a conflicting provider \
                 already being installed."
            )
        })
}
