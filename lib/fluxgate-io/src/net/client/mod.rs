//! Write clients for the store.
use std::io;

use ::http::StatusCode;
use snafu::Snafu;

use crate::ser::line_protocol::EncodeError;

pub mod http;
pub mod udp;

/// A transport error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum TransportError {
    /// The batch could not be encoded.
    #[snafu(display("failed to encode batch: {}", source))]
    Encode {
        /// Error source.
        source: EncodeError,
    },

    /// The write URL could not be built.
    #[snafu(display("invalid write endpoint '{}': {}", endpoint, source))]
    InvalidEndpoint {
        /// Endpoint that was rejected.
        endpoint: String,

        /// Error source.
        source: ::http::uri::InvalidUri,
    },

    /// The write request could not be built.
    #[snafu(display("failed to build write request: {}", source))]
    BuildRequest {
        /// Error source.
        source: ::http::Error,
    },

    /// The write request failed before a response was received.
    #[snafu(display("write request failed: {}", source))]
    SendRequest {
        /// Error source.
        source: hyper_util::client::legacy::Error,
    },

    /// The response body could not be read.
    #[snafu(display("failed to read write response: {}", source))]
    ReadResponse {
        /// Error source.
        source: hyper::Error,
    },

    /// The store responded with a non-success status.
    #[snafu(display("store rejected write with status {}: {}", status, body))]
    UnexpectedStatus {
        /// Response status.
        status: StatusCode,

        /// Error message returned by the store.
        body: String,
    },

    /// The UDP target address could not be resolved.
    #[snafu(display("failed to resolve '{}': {}", address, source))]
    Resolve {
        /// Address that was resolved.
        address: String,

        /// Error source.
        source: io::Error,
    },

    /// The UDP target address resolved to nothing.
    #[snafu(display("'{}' did not resolve to any address", address))]
    NoAddress {
        /// Address that was resolved.
        address: String,
    },

    /// The local UDP socket could not be set up.
    #[snafu(display("failed to set up UDP socket for '{}': {}", address, source))]
    Bind {
        /// Target address.
        address: String,

        /// Error source.
        source: io::Error,
    },

    /// A datagram could not be sent.
    #[snafu(display("failed to send datagram to '{}': {}", address, source))]
    SendDatagram {
        /// Target address.
        address: String,

        /// Error source.
        source: io::Error,
    },
}
