use std::fmt;

use serde::{Deserialize, Serialize};

/// A metric value.
///
/// The set of value types is closed. `Nil` is a value in its own right: a metric whose value field is present but
/// empty still carries a `MetricValue::Nil` rather than being coerced to zero or discarded.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum MetricValue {
    /// A signed integer.
    Integer(i64),

    /// A floating-point number.
    Float(f64),

    /// A string.
    String(String),

    /// A boolean.
    Boolean(bool),

    /// No value.
    Nil,
}

impl MetricValue {
    /// Returns the name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Boolean(_) => "boolean",
            Self::Nil => "nil",
        }
    }

    /// Returns `true` if this is `MetricValue::Nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{:?}", v),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Nil => f.write_str("nil"),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl<T> From<Option<T>> for MetricValue
where
    T: Into<MetricValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Nil)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(MetricValue::from(99), MetricValue::Integer(99));
        assert_eq!(MetricValue::from(3.141), MetricValue::Float(3.141));
        assert_eq!(MetricValue::from("bar"), MetricValue::String("bar".to_string()));
        assert_eq!(MetricValue::from(true), MetricValue::Boolean(true));
        assert_eq!(MetricValue::from(None::<i64>), MetricValue::Nil);
    }

    #[test]
    fn integral_float_keeps_float_type() {
        let value: MetricValue = serde_json::from_value(json!({ "type": "float", "data": 3 })).unwrap();
        assert_eq!(value, MetricValue::Float(3.0));
        assert_eq!(value.type_name(), "float");
    }

    #[test]
    fn nil_without_data() {
        let value: MetricValue = serde_json::from_value(json!({ "type": "nil" })).unwrap();
        assert!(value.is_nil());
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({ "type": "nil" }));
    }

    #[test]
    fn mismatched_data_rejected() {
        let result = serde_json::from_value::<MetricValue>(json!({ "type": "integer", "data": "ninety-nine" }));
        assert!(result.is_err());
    }
}
