use fluxgate_event::{Batch, Metric, Point, Precision, TagSet};
use indexmap::{map::Entry, IndexMap};

use crate::{
    config::PublisherConfiguration,
    point::{build_point, BuildError},
    resolver::resolve_namespace,
};

/// Assembles the metrics of one publish call into a batch.
///
/// In single-field mode, every metric becomes its own point. In multi-field mode, metrics that resolve to the same
/// measurement and tag set are merged into one point with a field per metric, keyed by leaf name. Groups are output in
/// the order they were first seen, and fields in the order their metrics appear. A later metric with the same leaf name
/// as an earlier one in its group replaces the earlier value, and the merged point takes the timestamp of the last
/// metric merged into it.
#[derive(Clone, Debug)]
pub struct BatchAssembler {
    database: String,
    retention: String,
    precision: Precision,
    multi_fields: bool,
}

impl BatchAssembler {
    /// Creates a new `BatchAssembler` in single-field mode.
    pub fn new<D, R>(database: D, retention: R, precision: Precision) -> Self
    where
        D: Into<String>,
        R: Into<String>,
    {
        Self {
            database: database.into(),
            retention: retention.into(),
            precision,
            multi_fields: false,
        }
    }

    /// Creates a new `BatchAssembler` targeting the database, retention policy, and precision of `config`, in the
    /// field mode it selects.
    pub fn from_configuration(config: &PublisherConfiguration) -> Self {
        Self::new(config.database(), config.retention(), config.precision()).with_multi_fields(config.multi_fields())
    }

    /// Sets whether sibling metrics are merged into multi-field points.
    pub fn with_multi_fields(mut self, multi_fields: bool) -> Self {
        self.multi_fields = multi_fields;
        self
    }

    /// Assembles `metrics` into a batch.
    ///
    /// # Errors
    ///
    /// If any metric has an empty namespace, an error is returned and no batch is produced.
    pub fn assemble(&self, metrics: &[Metric]) -> Result<Batch, BuildError> {
        let mut batch = Batch::new(self.database.clone(), self.retention.clone(), self.precision);

        if self.multi_fields {
            batch.extend(group_points(metrics)?);
        } else {
            for (index, metric) in metrics.iter().enumerate() {
                batch.push(build_point(index, metric)?);
            }
        }

        Ok(batch)
    }
}

fn group_points(metrics: &[Metric]) -> Result<impl Iterator<Item = Point>, BuildError> {
    let mut groups: IndexMap<(String, TagSet), Point> = IndexMap::new();

    for (index, metric) in metrics.iter().enumerate() {
        let resolved =
            resolve_namespace(metric.namespace(), metric.tags()).ok_or(BuildError::EmptyNamespace { index })?;

        match groups.entry((resolved.measurement, resolved.tags)) {
            Entry::Occupied(mut entry) => {
                entry
                    .get_mut()
                    .merge_field(resolved.field, metric.value().clone(), metric.timestamp());
            }
            Entry::Vacant(entry) => {
                let (measurement, tags) = entry.key().clone();
                let point = Point::new(measurement, tags, resolved.field, metric.value().clone(), metric.timestamp());
                entry.insert(point);
            }
        }
    }

    Ok(groups.into_values())
}
