use fluxgate_event::Metric;
use snafu::ResultExt as _;

use super::{DecodeError, Json, MetricDecoder};

/// Content type of a JSON-encoded list of metrics.
pub const CONTENT_TYPE_JSON: &str = "fluxgate.json";

/// Decodes a JSON array of metric records.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl MetricDecoder for JsonDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Vec<Metric>, DecodeError> {
        serde_json::from_slice(payload).context(Json)
    }
}

#[cfg(test)]
mod tests {
    use fluxgate_event::MetricValue;

    use super::*;

    #[test]
    fn decodes_every_value_type_in_order() {
        let payload = br#"[
            { "namespace": [{ "kind": "static", "value": "foo" }], "timestamp": "2016-06-01T12:00:00Z",
              "value": { "type": "integer", "data": 99 } },
            { "namespace": [{ "kind": "static", "value": "bar" }], "timestamp": "2016-06-01T12:00:00Z",
              "value": { "type": "float", "data": 3.141 } },
            { "namespace": [{ "kind": "static", "value": "qux" }], "timestamp": "2016-06-01T12:00:00Z",
              "value": { "type": "string", "data": "bar" } },
            { "namespace": [{ "kind": "static", "value": "baz" }], "timestamp": "2016-06-01T12:00:00Z",
              "value": { "type": "boolean", "data": true } },
            { "namespace": [{ "kind": "static", "value": "nil" }], "timestamp": "2016-06-01T12:00:00Z",
              "value": { "type": "nil" } }
        ]"#;

        let metrics = JsonDecoder.decode(payload).unwrap();
        let values = metrics.iter().map(Metric::value).cloned().collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![
                MetricValue::Integer(99),
                MetricValue::Float(3.141),
                MetricValue::String("bar".to_string()),
                MetricValue::Boolean(true),
                MetricValue::Nil,
            ]
        );
    }

    #[test]
    fn empty_array() {
        assert!(JsonDecoder.decode(b"[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_payload() {
        assert!(matches!(JsonDecoder.decode(b"{not json"), Err(DecodeError::Json { .. })));
        assert!(matches!(JsonDecoder.decode(b"{}"), Err(DecodeError::Json { .. })));
    }
}
