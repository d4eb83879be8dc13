//! Core telemetry data model.
//!
//! Metrics arrive from the upstream collection framework addressed by a hierarchical [`Namespace`], carrying a set of
//! tags, a timestamp, an optional unit, and a typed [`MetricValue`]. They leave as [`Point`]s, grouped into a [`Batch`]
//! that targets a single database and retention policy at a single [`Precision`].
#![deny(missing_docs)]

use std::collections::BTreeMap;

pub mod metric;
pub use self::metric::{Metric, MetricValue};

pub mod namespace;
pub use self::namespace::{Namespace, NamespaceElement};

pub mod point;
pub use self::point::{Batch, Point};

pub mod precision;
pub use self::precision::Precision;

/// A set of tags.
///
/// Tags are kept sorted by key so that two tag sets with the same pairs always compare and hash identically, regardless
/// of the order in which the pairs were inserted.
pub type TagSet = BTreeMap<String, String>;
