//! Payload encoding.
pub mod line_protocol;
