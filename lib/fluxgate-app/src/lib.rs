//! High-level application primitives.
//!
//! This crate provides the primitives a host process needs before publishing anything, such as initializing logging
//! and selecting the TLS cryptography provider.
#![deny(missing_docs)]

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "tls")]
pub mod tls;

/// Common imports.
pub mod prelude {
    #[cfg(feature = "logging")]
    pub use super::logging::{fatal_and_exit, initialize_logging, LoggingConfiguration};
    #[cfg(feature = "tls")]
    pub use super::tls::initialize_tls;
}
