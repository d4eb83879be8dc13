//! I/O primitives for moving telemetry in and out of the publisher.
//!
//! - [`deser`]: turning encoded payloads into metrics, keyed by content type
//! - [`ser`]: the store's line protocol
//! - [`net`]: HTTP and UDP write clients
#![deny(missing_docs)]

pub mod deser;
pub mod net;
pub mod ser;
