//! Core data models for the correlation engine

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Lenient timestamp field: unix seconds as a number or numeric string, or
/// an ISO 8601 / RFC 3339 date-time (naive forms are taken as UTC).
///
/// Anything else becomes `None`, which extraction counts as a missing timestamp.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(timestamp_from_value))
}

fn timestamp_from_value(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64)),
        Value::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_timestamp(s: &str) -> Option<Timestamp> {
    if let Ok(secs) = s.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|dt| dt.and_utc().timestamp())
}

/// String field where an explicit `null` means empty
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Severity shared by anomalies, log errors, events and hypotheses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Ordinal used for ranking hypotheses (critical=3 .. low=0)
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 3,
            Severity::High => 2,
            Severity::Medium => 1,
            Severity::Low => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topology record yielded by a service registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Any other fields carried by the registry (labels, owner, tier, ...)
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            dependencies: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }
}

/// Raw metric value as delivered by a metric source.
///
/// Sources are not trusted to send numbers; text is coerced when it parses
/// and treated as missing otherwise. Booleans, arrays and objects land in
/// `Other` and never count as numeric.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
    #[default]
    Missing,
    Other(Value),
}

impl SampleValue {
    /// Numeric value if the sample is a finite number or a numeric string
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            SampleValue::Number(v) => *v,
            SampleValue::Text(s) => s.trim().parse::<f64>().ok()?,
            SampleValue::Missing | SampleValue::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        SampleValue::Number(value)
    }
}

/// One `(timestamp, metric_name, value)` sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<Timestamp>,
    pub metric: String,
    #[serde(default)]
    pub value: SampleValue,
}

impl MetricSample {
    pub fn new(timestamp: Timestamp, metric: impl Into<String>, value: impl Into<SampleValue>) -> Self {
        Self {
            timestamp: Some(timestamp),
            metric: metric.into(),
            value: value.into(),
        }
    }
}

/// One `(timestamp, service, level, message)` log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

impl LogRecord {
    pub fn new(timestamp: Timestamp, service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp),
            service: Some(service.into()),
            level: None,
            message: message.into(),
        }
    }
}

/// One `(timestamp, type, reason, object, message)` infrastructure event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<Timestamp>,
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub event_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub object: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

impl EventRecord {
    pub fn new(
        timestamp: Timestamp,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Some(timestamp),
            event_type: event_type.into(),
            reason: reason.into(),
            object: object.into(),
            message: String::new(),
        }
    }
}

/// Metric sample flagged as anomalous
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAnomalyRecord {
    pub timestamp: Timestamp,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
}

/// Log line classified as an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogErrorRecord {
    pub timestamp: Timestamp,
    pub service: String,
    pub message: String,
    pub level: String,
    /// Keyword that marked the line as an error
    pub keyword: String,
    pub severity: Severity,
}

/// Infrastructure event classified as critical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalEventRecord {
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub object: String,
    #[serde(default)]
    pub message: String,
    pub severity: Severity,
}

impl CriticalEventRecord {
    /// Service name taken from the object reference (`pod/payment-x` -> `payment-x`)
    pub fn affected_service(&self) -> &str {
        match self.object.rsplit_once('/') {
            Some((_, name)) if !name.is_empty() => name,
            _ => "unknown",
        }
    }
}

/// Ranked candidate explanation for an incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseHypothesis {
    pub event: CriticalEventRecord,
    pub related_anomalies: Vec<MetricAnomalyRecord>,
    pub related_errors: Vec<LogErrorRecord>,
    pub upstream_services: Vec<String>,
    pub affected_service: String,
    pub root_cause: String,
    pub confidence: f64,
    pub severity: Severity,
    pub recommendation: String,
    pub timestamp: Timestamp,
}

impl RootCauseHypothesis {
    pub fn evidence_count(&self) -> usize {
        self.related_anomalies.len() + self.related_errors.len()
    }

    /// True when the root cause was traced to an upstream dependency
    pub fn is_upstream_cause(&self) -> bool {
        self.root_cause != self.affected_service
    }
}

/// Raw incident data as handed over by the collaborators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentInput {
    #[serde(default)]
    pub logs: Vec<LogRecord>,
    #[serde(default)]
    pub metrics: Vec<MetricSample>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_rank_is_not_lexical() {
        assert!(Severity::Critical.rank() > Severity::High.rank());
        assert!(Severity::High.rank() > Severity::Medium.rank());
        assert!(Severity::Medium.rank() > Severity::Low.rank());
        // alphabetical order would put "critical" first and "medium" last
        assert!("critical" < "high" && "high" < "medium");
    }

    #[test]
    fn test_sample_value_coercion() {
        assert_eq!(SampleValue::Number(1.5).as_f64(), Some(1.5));
        assert_eq!(SampleValue::Text(" 42 ".into()).as_f64(), Some(42.0));
        assert_eq!(SampleValue::Text("n/a".into()).as_f64(), None);
        assert_eq!(SampleValue::Number(f64::NAN).as_f64(), None);
        assert_eq!(SampleValue::Missing.as_f64(), None);
    }

    #[test]
    fn test_sample_value_deserializes_mixed_json() {
        let samples: Vec<MetricSample> = serde_json::from_str(
            r#"[
                {"timestamp": 1, "metric": "cpu", "value": 0.5},
                {"timestamp": 2, "metric": "cpu", "value": "0.7"},
                {"timestamp": 3, "metric": "cpu", "value": null},
                {"metric": "cpu"}
            ]"#,
        )
        .unwrap();

        assert_eq!(samples[0].value, SampleValue::Number(0.5));
        assert_eq!(samples[1].value.as_f64(), Some(0.7));
        assert_eq!(samples[2].value, SampleValue::Missing);
        assert_eq!(samples[3].timestamp, None);
    }

    #[test]
    fn test_non_numeric_value_does_not_fail_the_batch() {
        let samples: Vec<MetricSample> = serde_json::from_str(
            r#"[
                {"timestamp": 1, "metric": "cpu", "value": 50.0},
                {"timestamp": 2, "metric": "up", "value": true},
                {"timestamp": 3, "metric": "labels", "value": {"zone": "a"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].value.as_f64(), Some(50.0));
        assert_eq!(samples[1].value, SampleValue::Other(Value::Bool(true)));
        assert_eq!(samples[1].value.as_f64(), None);
        assert_eq!(samples[2].value.as_f64(), None);
    }

    #[test]
    fn test_null_event_fields_become_empty() {
        let events: Vec<EventRecord> = serde_json::from_str(
            r#"[
                {"timestamp": 1, "type": "Warning", "reason": null, "object": "pod/api"},
                {"timestamp": 2, "type": null, "reason": "PodEvicted", "object": null, "message": null}
            ]"#,
        )
        .unwrap();

        assert_eq!(events[0].reason, "");
        assert_eq!(events[0].object, "pod/api");
        assert_eq!(events[1].event_type, "");
        assert_eq!(events[1].object, "");

        let log: LogRecord =
            serde_json::from_str(r#"{"timestamp": 1, "service": null, "message": null}"#).unwrap();
        assert_eq!(log.message, "");
        assert_eq!(log.service, None);
    }

    #[test]
    fn test_string_timestamps_are_parsed() {
        let events: Vec<EventRecord> = serde_json::from_str(
            r#"[
                {"timestamp": "2024-05-01T10:00:00", "type": "Warning", "reason": "PodEvicted", "object": "pod/api"},
                {"timestamp": "2024-05-01T12:00:00+02:00", "type": "Warning"},
                {"timestamp": "2024-05-01 10:00:00.250", "type": "Warning"},
                {"timestamp": "1714557600", "type": "Warning"},
                {"timestamp": 1714557600.9, "type": "Warning"}
            ]"#,
        )
        .unwrap();

        // 2024-05-01T10:00:00Z
        let expected = 1_714_557_600;
        for event in &events {
            assert_eq!(event.timestamp, Some(expected));
        }
    }

    #[test]
    fn test_unparseable_timestamp_becomes_missing() {
        let logs: Vec<LogRecord> = serde_json::from_str(
            r#"[
                {"timestamp": "yesterday", "message": "fatal error"},
                {"timestamp": true, "message": "fatal error"},
                {"timestamp": null, "message": "fatal error"},
                {"timestamp": 10, "message": "fatal error"}
            ]"#,
        )
        .unwrap();

        let timestamps: Vec<_> = logs.iter().map(|l| l.timestamp).collect();
        assert_eq!(timestamps, vec![None, None, None, Some(10)]);
    }

    #[test]
    fn test_affected_service_from_object_reference() {
        let mut event = CriticalEventRecord {
            timestamp: 0,
            event_type: "Warning".into(),
            reason: "PodEvicted".into(),
            object: "pod/payment-x".into(),
            message: String::new(),
            severity: Severity::Critical,
        };
        assert_eq!(event.affected_service(), "payment-x");

        event.object = "apps/v1/deployment/api".into();
        assert_eq!(event.affected_service(), "api");

        event.object = "payment-x".into();
        assert_eq!(event.affected_service(), "unknown");

        event.object = "pod/".into();
        assert_eq!(event.affected_service(), "unknown");
    }

    #[test]
    fn test_service_descriptor_keeps_extra_attributes() {
        let descriptor: ServiceDescriptor = serde_json::from_str(
            r#"{"name": "api", "namespace": "shop", "dependencies": ["db"], "tier": "frontend"}"#,
        )
        .unwrap();

        assert_eq!(descriptor.namespace.as_deref(), Some("shop"));
        assert_eq!(descriptor.dependencies, vec!["db"]);
        assert_eq!(descriptor.attributes["tier"], "frontend");
    }
}
