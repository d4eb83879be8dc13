//! Points and batches.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::{MetricValue, Precision, TagSet};

/// A single row written to the store.
///
/// Fields keep their insertion order. A point always has at least one field once it has been built from a metric.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    measurement: String,
    tags: TagSet,
    fields: IndexMap<String, MetricValue>,
    timestamp: DateTime<Utc>,
}

impl Point {
    /// Creates a new `Point` with a single field.
    pub fn new<M, F>(measurement: M, tags: TagSet, field: F, value: MetricValue, timestamp: DateTime<Utc>) -> Self
    where
        M: Into<String>,
        F: Into<String>,
    {
        let mut fields = IndexMap::with_capacity(1);
        fields.insert(field.into(), value);

        Self {
            measurement: measurement.into(),
            tags,
            fields,
            timestamp,
        }
    }

    /// Merges a field into this point.
    ///
    /// If a field with the same name already exists, its value is replaced in place, keeping its original position.
    /// The point's timestamp is updated to `timestamp`.
    pub fn merge_field<F>(&mut self, field: F, value: MetricValue, timestamp: DateTime<Utc>)
    where
        F: Into<String>,
    {
        self.fields.insert(field.into(), value);
        self.timestamp = timestamp;
    }

    /// Gets the measurement name.
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Gets a reference to the tags.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Gets a reference to the fields, in insertion order.
    pub fn fields(&self) -> &IndexMap<String, MetricValue> {
        &self.fields
    }

    /// Gets the value of the given field, if it exists.
    pub fn field(&self, name: &str) -> Option<&MetricValue> {
        self.fields.get(name)
    }

    /// Gets the timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A set of points submitted to the store as one write.
///
/// Every point in a batch is written to the same database and retention policy, at the same timestamp precision.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    database: String,
    retention_policy: String,
    precision: Precision,
    points: Vec<Point>,
}

impl Batch {
    /// Creates a new, empty `Batch`.
    pub fn new<D, R>(database: D, retention_policy: R, precision: Precision) -> Self
    where
        D: Into<String>,
        R: Into<String>,
    {
        Self {
            database: database.into(),
            retention_policy: retention_policy.into(),
            precision,
            points: Vec::new(),
        }
    }

    /// Adds a point to the batch.
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Gets the target database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Gets the target retention policy.
    pub fn retention_policy(&self) -> &str {
        &self.retention_policy
    }

    /// Gets the timestamp precision.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Gets the points, in the order they were added.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Returns the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the batch holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Extend<Point> for Batch {
    fn extend<I: IntoIterator<Item = Point>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}
