//! Network clients.
pub mod client;
