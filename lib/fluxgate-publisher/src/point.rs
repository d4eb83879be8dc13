use fluxgate_event::{Metric, Point};
use snafu::Snafu;

use crate::resolver::resolve_namespace;

/// A point build error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum BuildError {
    /// A metric had no namespace elements.
    #[snafu(display("metric at index {} has an empty namespace", index))]
    EmptyNamespace {
        /// Position of the metric in the publish call.
        index: usize,
    },
}

/// Builds a single-field point from a metric.
///
/// The point's only field is named after the metric's leaf and carries its value unchanged, including `Nil`. The unit
/// is not carried over.
///
/// # Errors
///
/// If the metric's namespace is empty, an error is returned. `index` is the metric's position in the publish call, and
/// is only used to report the error.
pub fn build_point(index: usize, metric: &Metric) -> Result<Point, BuildError> {
    let resolved = resolve_namespace(metric.namespace(), metric.tags()).ok_or(BuildError::EmptyNamespace { index })?;

    Ok(Point::new(
        resolved.measurement,
        resolved.tags,
        resolved.field,
        metric.value().clone(),
        metric.timestamp(),
    ))
}
