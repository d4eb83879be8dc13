//! Metric types.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Namespace, TagSet};

mod value;
pub use self::value::MetricValue;

/// A metric.
///
/// A metric is a single observation taken at a particular point in time: the namespace addresses what was observed, the
/// tags describe where it was observed (host, zone, and so on), and the value holds the observation itself.
///
/// The unit is descriptive only and plays no part in the identity of the metric.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Metric {
    namespace: Namespace,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    tags: TagSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    value: MetricValue,
}

impl Metric {
    /// Creates a new `Metric`.
    pub fn new<V>(namespace: Namespace, timestamp: DateTime<Utc>, tags: TagSet, value: V) -> Self
    where
        V: Into<MetricValue>,
    {
        Self {
            namespace,
            timestamp,
            tags,
            unit: None,
            value: value.into(),
        }
    }

    /// Sets the unit of the metric.
    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Gets a reference to the namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Gets a mutable reference to the namespace.
    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }

    /// Gets the timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Gets a reference to the tags.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Gets the unit, if any.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Gets a reference to the value.
    pub fn value(&self) -> &MetricValue {
        &self.value
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{} @ {}]", self.namespace, self.value, self.timestamp.to_rfc3339())
    }
}
