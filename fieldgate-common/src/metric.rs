//! Logical protocol metric model.
//!
//! Metrics are what the bridge hands to the telemetry publisher
//! collaborator. The bridge never encodes wire bytes itself; these types
//! describe the metric set and value changes at the logical level.

use serde::{Deserialize, Serialize};

use crate::value::ValueKind;

/// Protocol-level primitive or composite value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    /// Composite value: ordered member list drawn from a structure template.
    Template(Vec<MetricMember>),
}

impl MetricValue {
    pub fn as_members(&self) -> Option<&[MetricMember]> {
        match self {
            MetricValue::Template(members) => Some(members),
            _ => None,
        }
    }
}

/// One member of a composite metric value.
///
/// `value` is `None` in definition stubs, which declare the member's
/// name and kind without carrying data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMember {
    pub name: String,
    pub kind: ValueKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<MetricValue>,
}

impl MetricMember {
    pub fn new(name: impl Into<String>, kind: ValueKind, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            kind,
            value: Some(value),
        }
    }

    /// A definition stub: name and kind only.
    pub fn stub(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: None,
        }
    }
}

/// A single logical metric handed to the telemetry publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name within its scope.
    pub name: String,

    /// Resolved protocol-level kind.
    pub kind: ValueKind,

    pub value: MetricValue,

    /// Unix epoch milliseconds.
    pub timestamp: i64,

    /// True for one-time template definition metrics (member stubs, no
    /// values) carried in schema announcements.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_definition: bool,
}

impl Metric {
    /// Create a metric stamped with the current time.
    pub fn new(name: impl Into<String>, kind: ValueKind, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            timestamp: timestamp_millis(),
            is_definition: false,
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn definition(mut self) -> Self {
        self.is_definition = true;
        self
    }
}

/// Current time as milliseconds since the Unix epoch.
pub fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_builder() {
        let metric = Metric::new("plc1/temp", ValueKind::Number, MetricValue::Number(21.5));
        assert_eq!(metric.name, "plc1/temp");
        assert!(!metric.is_definition);
        assert!(metric.timestamp > 0);

        let metric = metric.at(1234).definition();
        assert_eq!(metric.timestamp, 1234);
        assert!(metric.is_definition);
    }

    #[test]
    fn definition_stub_has_no_value() {
        let stub = MetricMember::stub("rpm", ValueKind::Number);
        assert!(stub.value.is_none());

        let json = serde_json::to_string(&stub).unwrap();
        assert!(!json.contains("value"));
    }

    #[test]
    fn untagged_metric_value_decoding() {
        let v: MetricValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, MetricValue::Null);

        let v: MetricValue = serde_json::from_str("7.5").unwrap();
        assert_eq!(v, MetricValue::Number(7.5));

        let v: MetricValue =
            serde_json::from_str(r#"[{"name": "rpm", "kind": "number", "value": 900.0}]"#).unwrap();
        let members = v.as_members().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].value, Some(MetricValue::Number(900.0)));
    }

    #[test]
    fn compact_serialization_skips_definition_flag() {
        let metric = Metric::new("t", ValueKind::Number, MetricValue::Number(1.0));
        let json = serde_json::to_string(&metric).unwrap();
        assert!(!json.contains("is_definition"));
    }
}
