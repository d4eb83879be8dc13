//! Metric publishing.
//!
//! A publish call moves a batch of metrics through a fixed pipeline: the payload is decoded, each metric's namespace is
//! resolved into a measurement, field, and tags, points are built and assembled into a [`Batch`][fluxgate_event::Batch],
//! and the batch is written to the store over HTTP or UDP in a single call. See [`Publisher`] for the entry point.
#![deny(missing_docs)]

mod batch;
pub use self::batch::BatchAssembler;

mod config;
pub use self::config::{PublisherConfiguration, PublisherConfigurationError, Scheme};

mod point;
pub use self::point::{build_point, BuildError};

mod publisher;
pub use self::publisher::{ErrorKind, PublishError, Publisher};

mod resolver;
pub use self::resolver::{resolve_namespace, ResolvedNamespace};

pub mod transport;
