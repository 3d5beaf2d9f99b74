//! Core metric types.
//!
//! Values are a closed sum type over the two supported scalars, and
//! observations own their value outright.

use crate::core::{MetrologError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a metric name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Signed 64-bit integer samples
    #[serde(alias = "int")]
    Integer,
    /// 64-bit floating-point samples
    #[serde(alias = "double")]
    Float,
}

impl MetricType {
    /// Lowercase name used in logs and config
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Integer => "integer",
            MetricType::Float => "float",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricType {
    type Err = MetrologError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(MetricType::Integer),
            "float" | "double" => Ok(MetricType::Float),
            other => Err(MetrologError::parse(format!("unknown metric type '{}'", other))),
        }
    }
}

/// A typed scalar sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Integer sample
    Integer(i64),
    /// Floating-point sample
    Float(f64),
}

impl MetricValue {
    /// The type tag this value carries
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Integer(_) => MetricType::Integer,
            MetricValue::Float(_) => MetricType::Float,
        }
    }

    /// Plain textual form, as written to the sink.
    ///
    /// Floats use the shortest representation that parses back to the same
    /// bits, so the round trip through [`MetricValue::deserialize`] is exact.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Parse the textual form for a known metric type.
    pub fn deserialize(text: &str, metric_type: MetricType) -> Result<Self> {
        let text = text.trim();
        match metric_type {
            MetricType::Integer => text.parse::<i64>().map(MetricValue::Integer).map_err(|e| {
                MetrologError::parse(format!("invalid integer value '{}': {}", text, e))
            }),
            MetricType::Float => text.parse::<f64>().map(MetricValue::Float).map_err(|e| {
                MetrologError::parse(format!("invalid float value '{}': {}", text, e))
            }),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        MetricValue::Integer(i64::from(value))
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        MetricValue::Float(f64::from(value))
    }
}

/// One timestamped value recorded for a metric name
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Metric name this observation belongs to
    pub name: String,
    /// Recorded value
    pub value: MetricValue,
    /// When the value was observed
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn new(name: impl Into<String>, value: MetricValue, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_tags() {
        assert_eq!(MetricValue::from(7_i64).metric_type(), MetricType::Integer);
        assert_eq!(MetricValue::from(7_i32).metric_type(), MetricType::Integer);
        assert_eq!(MetricValue::from(0.5_f64).metric_type(), MetricType::Float);
        assert_eq!(MetricValue::from(0.5_f32).metric_type(), MetricType::Float);
    }

    #[test]
    fn test_serialize_plain_text() {
        assert_eq!(MetricValue::Integer(-42).serialize(), "-42");
        assert_eq!(MetricValue::Float(0.5).serialize(), "0.5");
        assert_eq!(MetricValue::Float(1.0).serialize(), "1");
    }

    #[test]
    fn test_deserialize_by_declared_type() {
        assert_eq!(
            MetricValue::deserialize(" 12 ", MetricType::Integer).unwrap(),
            MetricValue::Integer(12)
        );
        // An integer literal is a valid float sample
        assert_eq!(
            MetricValue::deserialize("12", MetricType::Float).unwrap(),
            MetricValue::Float(12.0)
        );
        assert!(MetricValue::deserialize("0.5", MetricType::Integer).is_err());
        assert!(MetricValue::deserialize("abc", MetricType::Float).is_err());
    }

    #[test]
    fn test_float_special_values() {
        let nan = MetricValue::deserialize(&MetricValue::Float(f64::NAN).serialize(), MetricType::Float)
            .unwrap();
        match nan {
            MetricValue::Float(v) => assert!(v.is_nan()),
            MetricValue::Integer(_) => panic!("Expected float"),
        }

        let inf = MetricValue::Float(f64::NEG_INFINITY).serialize();
        assert_eq!(
            MetricValue::deserialize(&inf, MetricType::Float).unwrap(),
            MetricValue::Float(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_metric_type_parsing() {
        assert_eq!("int".parse::<MetricType>().unwrap(), MetricType::Integer);
        assert_eq!("FLOAT".parse::<MetricType>().unwrap(), MetricType::Float);
        assert_eq!("double".parse::<MetricType>().unwrap(), MetricType::Float);
        assert!("histogram".parse::<MetricType>().is_err());
    }

    mod round_trip {
        use crate::metrics::types::{MetricType, MetricValue};
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn integers_round_trip_exactly(v in any::<i64>()) {
                let value = MetricValue::Integer(v);
                let parsed = MetricValue::deserialize(&value.serialize(), MetricType::Integer).unwrap();
                prop_assert_eq!(parsed, value);
            }

            #[test]
            fn finite_floats_round_trip_exactly(v in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
                let value = MetricValue::Float(v);
                let parsed = MetricValue::deserialize(&value.serialize(), MetricType::Float).unwrap();
                prop_assert_eq!(parsed, value);
            }
        }
    }
}
