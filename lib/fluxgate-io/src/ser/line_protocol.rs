//! The store's line protocol.
//!
//! Each point is written as a single line:
//!
//! ```text
//! measurement[,tag_key=tag_value...] field_key=field_value[,field_key=field_value...] timestamp
//! ```
use fluxgate_event::{precision::TimestampOutOfRange, Batch, MetricValue, Point, Precision};
use snafu::{ResultExt as _, Snafu};

/// An encode error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum EncodeError {
    /// The point has an empty measurement name.
    #[snafu(display("point has an empty measurement name"))]
    EmptyMeasurement,

    /// The point has no fields.
    #[snafu(display("point '{}' has no fields", measurement))]
    NoFields {
        /// Measurement of the point.
        measurement: String,
    },

    /// A float field was NaN or infinite, which the store cannot represent.
    #[snafu(display("field '{}' of point '{}' is not a finite number", field, measurement))]
    NonFiniteFloat {
        /// Measurement of the point.
        measurement: String,

        /// Name of the field.
        field: String,
    },

    /// The point's timestamp could not be represented.
    #[snafu(display("invalid timestamp for point '{}': {}", measurement, source))]
    Timestamp {
        /// Measurement of the point.
        measurement: String,

        /// Error source.
        source: TimestampOutOfRange,
    },
}

/// How timestamps are written.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TimestampEncoding {
    /// Whole units of the precision since the Unix epoch.
    ///
    /// The reader must be told the precision out of band, such as through a write parameter.
    #[default]
    Units,

    /// Nanoseconds since the Unix epoch, rounded to the precision.
    RoundedNanoseconds,
}

/// Encodes points in line protocol.
#[derive(Clone, Copy, Debug)]
pub struct LineProtocolEncoder {
    precision: Precision,
    timestamps: TimestampEncoding,
}

impl LineProtocolEncoder {
    /// Creates a new `LineProtocolEncoder` that writes timestamps in whole units of `precision`.
    pub fn new(precision: Precision) -> Self {
        Self {
            precision,
            timestamps: TimestampEncoding::Units,
        }
    }

    /// Sets how timestamps are written.
    pub fn with_timestamp_encoding(mut self, timestamps: TimestampEncoding) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Encodes a single point, appending it to `buf` without a trailing newline.
    ///
    /// Tags are written sorted by key. Tags with an empty key or value are skipped, as the store rejects them.
    ///
    /// # Errors
    ///
    /// If the point cannot be represented in line protocol, an error is returned and `buf` is left unchanged.
    pub fn encode_point(&self, point: &Point, buf: &mut String) -> Result<(), EncodeError> {
        let measurement = point.measurement();
        if measurement.is_empty() {
            return Err(EncodeError::EmptyMeasurement);
        }
        if point.fields().is_empty() {
            return NoFields { measurement }.fail();
        }

        let timestamp = match self.timestamps {
            TimestampEncoding::Units => self.precision.to_units(point.timestamp()),
            TimestampEncoding::RoundedNanoseconds => self.precision.round_nanos(point.timestamp()),
        }
        .context(Timestamp { measurement })?;

        let mut line = String::with_capacity(64);
        push_escaped(&mut line, measurement, &[',', ' ']);

        for (key, value) in point.tags() {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            line.push(',');
            push_escaped(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            push_escaped(&mut line, value, &[',', '=', ' ']);
        }

        line.push(' ');
        for (i, (key, value)) in point.fields().iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            push_escaped(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            push_field_value(&mut line, value).ok_or_else(|| EncodeError::NonFiniteFloat {
                measurement: measurement.to_string(),
                field: key.clone(),
            })?;
        }

        line.push(' ');
        line.push_str(&timestamp.to_string());

        buf.push_str(&line);
        Ok(())
    }

    /// Encodes every point in `batch`, returning one line per point in batch order.
    ///
    /// # Errors
    ///
    /// If any point cannot be encoded, an error is returned.
    pub fn encode_batch(&self, batch: &Batch) -> Result<Vec<String>, EncodeError> {
        batch
            .points()
            .iter()
            .map(|point| {
                let mut line = String::new();
                self.encode_point(point, &mut line)?;
                Ok(line)
            })
            .collect()
    }
}

fn push_escaped(buf: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if special.contains(&c) {
            buf.push('\\');
        }
        buf.push(c);
    }

    // A trailing backslash would otherwise escape the separator written after it.
    if s.ends_with('\\') {
        buf.push('\\');
    }
}

// Returns `None` for non-finite floats.
fn push_field_value(buf: &mut String, value: &MetricValue) -> Option<()> {
    match value {
        MetricValue::Integer(v) => {
            buf.push_str(&v.to_string());
            buf.push('i');
        }
        MetricValue::Float(v) => {
            if !v.is_finite() {
                return None;
            }
            buf.push_str(&v.to_string());
        }
        MetricValue::String(v) => {
            buf.push('"');
            for c in v.chars() {
                if c == '"' || c == '\\' {
                    buf.push('\\');
                }
                buf.push(c);
            }
            buf.push('"');
        }
        MetricValue::Boolean(v) => buf.push_str(if *v { "true" } else { "false" }),
        MetricValue::Nil => buf.push_str("\"\""),
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone as _, Utc};
    use fluxgate_event::TagSet;

    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_opt(1_464_782_400, 123_456_789).unwrap()
    }

    fn encode(point: &Point) -> String {
        let mut buf = String::new();
        LineProtocolEncoder::new(Precision::Seconds)
            .encode_point(point, &mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn field_types() {
        let cases = [
            (MetricValue::Integer(99), "foo v=99i 1464782400"),
            (MetricValue::Float(3.141), "foo v=3.141 1464782400"),
            (MetricValue::String("bar".into()), "foo v=\"bar\" 1464782400"),
            (MetricValue::Boolean(true), "foo v=true 1464782400"),
            (MetricValue::Nil, "foo v=\"\" 1464782400"),
        ];

        for (value, expected) in cases {
            let point = Point::new("foo", TagSet::new(), "v", value, ts());
            assert_eq!(encode(&point), expected);
        }
    }

    #[test]
    fn tags_sorted_and_empty_values_skipped() {
        let tags = TagSet::from([
            ("zone".to_string(), "red".to_string()),
            ("host".to_string(), "hostname".to_string()),
            ("rack".to_string(), String::new()),
        ]);
        let point = Point::new("intel/cpu", tags, "load", MetricValue::Integer(1), ts());
        assert_eq!(encode(&point), "intel/cpu,host=hostname,zone=red load=1i 1464782400");
    }

    #[test]
    fn escaping() {
        let tags = TagSet::from([("a key".to_string(), "x=y,z".to_string())]);
        let mut point = Point::new("my measurement,1", tags, "f=1", MetricValue::String("say \"hi\" \\o/".into()), ts());
        point.merge_field("b", MetricValue::Boolean(false), ts());

        assert_eq!(
            encode(&point),
            r#"my\ measurement\,1,a\ key=x\=y\,z f\=1="say \"hi\" \\o/",b=false 1464782400"#
        );
    }

    #[test]
    fn trailing_backslash_escaped() {
        let tags = TagSet::from([
            ("dir".to_string(), "C:\\".to_string()),
            ("zone".to_string(), "red".to_string()),
        ]);
        let point = Point::new("disk\\", tags, "free\\", MetricValue::Integer(1), ts());

        assert_eq!(
            encode(&point),
            r#"disk\\,dir=C:\\,zone=red free\\=1i 1464782400"#
        );
    }

    #[test]
    fn inner_backslash_kept_as_is() {
        let tags = TagSet::from([("path".to_string(), "a\\b".to_string())]);
        let point = Point::new("disk", tags, "v", MetricValue::Integer(1), ts());
        assert_eq!(encode(&point), r#"disk,path=a\b v=1i 1464782400"#);
    }

    #[test]
    fn multiple_fields_in_insertion_order() {
        let mut point = Point::new("a/b", TagSet::new(), "z", MetricValue::Integer(3), ts());
        point.merge_field("x", MetricValue::Integer(1), ts());
        point.merge_field("y", MetricValue::Float(2.5), ts());
        assert_eq!(encode(&point), "a/b z=3i,x=1i,y=2.5 1464782400");
    }

    #[test]
    fn non_finite_float_rejected() {
        let point = Point::new("foo", TagSet::new(), "v", MetricValue::Float(f64::NAN), ts());
        let mut buf = String::from("keep");
        let err = LineProtocolEncoder::new(Precision::Seconds)
            .encode_point(&point, &mut buf)
            .unwrap_err();

        assert!(matches!(err, EncodeError::NonFiniteFloat { ref field, .. } if field == "v"));
        assert_eq!(buf, "keep");
    }

    #[test]
    fn empty_measurement_rejected() {
        let point = Point::new("", TagSet::new(), "v", MetricValue::Integer(1), ts());
        let mut buf = String::new();
        let result = LineProtocolEncoder::new(Precision::Seconds).encode_point(&point, &mut buf);
        assert!(matches!(result, Err(EncodeError::EmptyMeasurement)));
    }

    #[test]
    fn rounded_nanosecond_timestamps() {
        let point = Point::new("foo", TagSet::new(), "v", MetricValue::Integer(1), ts());
        let encoder = LineProtocolEncoder::new(Precision::Milliseconds)
            .with_timestamp_encoding(TimestampEncoding::RoundedNanoseconds);

        let mut buf = String::new();
        encoder.encode_point(&point, &mut buf).unwrap();
        assert_eq!(buf, "foo v=1i 1464782400123000000");
    }

    #[test]
    fn encode_batch_in_order() {
        let mut batch = Batch::new("test", "autogen", Precision::Nanoseconds);
        batch.push(Point::new("first", TagSet::new(), "v", MetricValue::Integer(1), ts()));
        batch.push(Point::new("second", TagSet::new(), "v", MetricValue::Integer(2), ts()));

        let lines = LineProtocolEncoder::new(batch.precision()).encode_batch(&batch).unwrap();
        assert_eq!(
            lines,
            vec!["first v=1i 1464782400123456789", "second v=2i 1464782400123456789"]
        );
    }
}
