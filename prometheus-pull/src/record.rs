//! Decoded metric samples and the records emitted for them.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Record field holding the metric name.
pub const METRIC_NAME_KEY: &str = "metric_name";
/// Record field holding the metric value.
pub const METRIC_VALUE_KEY: &str = "metric_value";
/// Record field holding the declared metric type.
pub const METRIC_TYPE_KEY: &str = "metric_type";

/// Ordered label set of a sample.
///
/// Keys keep the position of their first occurrence. Inserting an existing
/// key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    /// Create an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label, replacing the value of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Look up a label value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over labels in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sample carries no label.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One sample decoded from an exposition line.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Metric name.
    pub name: String,
    /// Sample value. May be NaN or infinite.
    pub value: f64,
    /// Labels, keys already carrying the configured prefix.
    pub labels: Labels,
    /// Explicit timestamp in epoch milliseconds. Negative before 1970.
    pub timestamp: Option<i64>,
    /// Type declared by a preceding `# TYPE` line.
    pub metric_type: Option<String>,
}

impl MetricSample {
    /// Create a sample without labels, timestamp or type.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            labels: Labels::new(),
            timestamp: None,
            metric_type: None,
        }
    }

    /// Build the emitted record.
    ///
    /// Labels come first; the metric fields are written after them and win
    /// over a label of the same name.
    pub fn into_record(self) -> Record {
        let mut record = Record::new();
        for (key, value) in self.labels.0 {
            record.insert(key, value);
        }
        record.insert(METRIC_NAME_KEY, self.name);
        record.insert(METRIC_VALUE_KEY, self.value);
        if let Some(metric_type) = self.metric_type {
            record.insert(METRIC_TYPE_KEY, metric_type);
        }
        record
    }
}

/// Value of a record field.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric value (metric values).
    Number(f64),
    /// Text value (names, labels, types, source fields).
    Text(String),
}

impl FieldValue {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    /// Text value, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Ordered mapping handed to the emission sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether a field is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no field.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if the system clock is before the epoch.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_keep_first_position_and_last_value() {
        let mut labels = Labels::new();
        labels.insert("code", "200");
        labels.insert("method", "post");
        labels.insert("code", "500");

        let pairs: Vec<_> = labels.iter().collect();
        assert_eq!(pairs, vec![("code", "500"), ("method", "post")]);
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_into_record_layout() {
        let mut sample = MetricSample::new("http_requests_total", 1027.0);
        sample.labels.insert("method", "post");
        sample.metric_type = Some("counter".to_string());

        let record = sample.into_record();
        let keys: Vec<_> = record.keys().collect();
        assert_eq!(
            keys,
            vec!["method", "metric_name", "metric_value", "metric_type"]
        );
        assert_eq!(
            record.get("metric_name").and_then(FieldValue::as_str),
            Some("http_requests_total")
        );
        assert_eq!(
            record.get("metric_value").and_then(FieldValue::as_f64),
            Some(1027.0)
        );
    }

    #[test]
    fn test_metric_fields_win_over_labels() {
        let mut sample = MetricSample::new("up", 1.0);
        sample.labels.insert("metric_name", "shadowed");

        let record = sample.into_record();
        assert_eq!(record.len(), 2);
        assert_eq!(
            record.get("metric_name").and_then(FieldValue::as_str),
            Some("up")
        );
    }

    #[test]
    fn test_record_serializes_as_ordered_map() {
        let mut record = Record::new();
        record.insert("b", "x");
        record.insert("a", 1.5);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"b":"x","a":1.5}"#);
    }

    #[test]
    fn test_non_finite_values_serialize_as_null_in_json() {
        let mut record = Record::new();
        record.insert("metric_value", f64::NAN);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"metric_value":null}"#);
    }
}
