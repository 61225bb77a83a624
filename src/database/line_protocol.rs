// InfluxDB line protocol encoding, shared by the v1 and v3 sessions
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::database::DatabaseError;

/// Timestamp precision of a write request. The v1 and v3 HTTP APIs spell
/// the query parameter differently; both spellings live here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WritePrecision {
    Seconds,
    Milliseconds,
    Microseconds,
    #[default]
    Nanoseconds,
}

impl WritePrecision {
    pub(crate) fn v1_param(self) -> &'static str {
        match self {
            WritePrecision::Seconds => "s",
            WritePrecision::Milliseconds => "ms",
            WritePrecision::Microseconds => "u",
            WritePrecision::Nanoseconds => "ns",
        }
    }

    pub(crate) fn v3_param(self) -> &'static str {
        match self {
            WritePrecision::Seconds => "second",
            WritePrecision::Milliseconds => "millisecond",
            WritePrecision::Microseconds => "microsecond",
            WritePrecision::Nanoseconds => "nanosecond",
        }
    }
}

/// Per-request options for [`InfluxDbV1Session::write_points`] and
/// [`InfluxDbV3Session::write`].
///
/// [`InfluxDbV1Session::write_points`]: crate::database::InfluxDbV1Session::write_points
/// [`InfluxDbV3Session::write`]: crate::database::InfluxDbV3Session::write
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Target database; defaults to the session's configured one.
    pub database: Option<String>,
    pub precision: WritePrecision,
    /// Shared tags merged into every point. Point-specific tags win.
    pub tags: BTreeMap<String, String>,
}

/// A field value in line protocol. Integers are written with the `i`
/// suffix, unsigned integers with `u`, strings quoted.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    UInteger(u64),
    Boolean(bool),
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::UInteger(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One measurement record. Tags are kept sorted; a point without fields is
/// rejected at encoding time.
#[derive(Debug, Clone)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: Option<i64>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Timestamp in the precision of the write request.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Timestamp from a wall-clock time, stored at nanosecond precision.
    /// Combine with [`WritePrecision::Nanoseconds`] (the default).
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.timestamp = time.timestamp_nanos_opt();
        self
    }

    fn to_line(&self, shared_tags: &BTreeMap<String, String>) -> Result<String, DatabaseError> {
        if self.fields.is_empty() {
            return Err(DatabaseError::InvalidPoint(format!(
                "point '{}' has no fields",
                self.measurement
            )));
        }

        let mut merged: BTreeMap<&str, &str> = shared_tags
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        for (key, value) in &self.tags {
            merged.insert(key, value);
        }

        let mut line = escape_measurement(&self.measurement);
        for (key, value) in merged {
            line.push(',');
            line.push_str(&escape_tag(key));
            line.push('=');
            line.push_str(&escape_tag(value));
        }

        line.push(' ');
        let mut first = true;
        for (key, value) in &self.fields {
            if !first {
                line.push(',');
            }
            first = false;
            line.push_str(&escape_tag(key));
            line.push('=');
            line.push_str(&encode_field_value(value));
        }

        if let Some(timestamp) = self.timestamp {
            line.push(' ');
            line.push_str(&timestamp.to_string());
        }

        Ok(line)
    }
}

/// Encode a batch of points into a newline-separated line protocol body.
pub(crate) fn encode_points(
    points: &[Point],
    shared_tags: &BTreeMap<String, String>,
) -> Result<String, DatabaseError> {
    let lines = points
        .iter()
        .map(|point| point.to_line(shared_tags))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

fn encode_field_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Float(v) => v.to_string(),
        FieldValue::Integer(v) => format!("{v}i"),
        FieldValue::UInteger(v) => format!("{v}u"),
        FieldValue::Boolean(v) => v.to_string(),
        FieldValue::Text(v) => format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

fn escape_measurement(value: &str) -> String {
    value.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
