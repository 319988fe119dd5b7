//! Core data types for parsed recordings
//!
//! This module defines the values that flow from the parser into the index:
//! - `FieldValue`: A typed scalar carried by one event field
//! - `Event`: One timestamped occurrence of a named event type
//! - `RecordingMetadata`: Recording-wide start time and duration
//! - `TimeRange`: An inclusive millisecond interval for queries

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Truncate epoch nanoseconds to epoch milliseconds (floor).
pub fn nanos_to_millis(nanos: i64) -> i64 {
    nanos.div_euclid(NANOS_PER_MILLI)
}

/// A typed scalar value of one event field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Integral or floating point number
    Numeric(f64),
    /// Text value
    Text(String),
    /// Boolean flag
    Bool(bool),
    /// Elapsed time in nanoseconds
    Duration(i64),
    /// Explicitly recorded absence of a value (null string)
    Null,
}

/// Kind of a field value, used for schema inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Numeric,
    Text,
    Bool,
    Duration,
}

impl ValueKind {
    /// Whether values of this kind can form a time series
    pub fn is_series(&self) -> bool {
        matches!(self, ValueKind::Numeric | ValueKind::Duration)
    }

    /// Column type name used in table responses
    pub fn column_type(&self) -> &'static str {
        match self {
            ValueKind::Numeric | ValueKind::Duration => "number",
            ValueKind::Text => "string",
            ValueKind::Bool => "boolean",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Numeric => write!(f, "numeric"),
            ValueKind::Text => write!(f, "text"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Duration => write!(f, "duration"),
        }
    }
}

impl FieldValue {
    /// Kind of this value, `None` for nulls
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            FieldValue::Numeric(_) => Some(ValueKind::Numeric),
            FieldValue::Text(_) => Some(ValueKind::Text),
            FieldValue::Bool(_) => Some(ValueKind::Bool),
            FieldValue::Duration(_) => Some(ValueKind::Duration),
            FieldValue::Null => None,
        }
    }

    /// Value as a series sample. Durations are expressed in milliseconds.
    pub fn as_series_value(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(v) => Some(*v),
            FieldValue::Duration(nanos) => Some(*nanos as f64 / NANOS_PER_MILLI as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Numeric(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Numeric(v as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<std::time::Duration> for FieldValue {
    fn from(v: std::time::Duration) -> Self {
        FieldValue::Duration(i64::try_from(v.as_nanos()).unwrap_or(i64::MAX))
    }
}

/// A single recorded event
///
/// Field order is the declaration order of the event type, which the
/// index uses as the first-seen column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event type name (e.g. "jdk.CPULoad")
    pub event_type: Arc<str>,
    /// Epoch timestamp in nanoseconds
    pub timestamp_nanos: i64,
    /// Field name/value pairs in declaration order
    pub fields: Vec<(Arc<str>, FieldValue)>,
}

impl Event {
    /// Create an event without fields
    pub fn new(event_type: impl Into<Arc<str>>, timestamp_nanos: i64) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp_nanos,
            fields: Vec::new(),
        }
    }

    /// Create an event at a millisecond timestamp
    pub fn at_millis(event_type: impl Into<Arc<str>>, timestamp_millis: i64) -> Self {
        Self::new(event_type, timestamp_millis.saturating_mul(NANOS_PER_MILLI))
    }

    /// Builder method: append a field
    pub fn field(mut self, name: impl Into<Arc<str>>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Look up a field value by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field.as_ref() == name)
            .map(|(_, value)| value)
    }

    /// Timestamp truncated to epoch milliseconds
    pub fn timestamp_millis(&self) -> i64 {
        nanos_to_millis(self.timestamp_nanos)
    }
}

/// Recording-wide metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecordingMetadata {
    /// Epoch nanoseconds of the recording start
    pub start_nanos: i64,
    /// Covered wall time in nanoseconds, never negative
    pub duration_nanos: i64,
}

impl RecordingMetadata {
    pub fn new(start_nanos: i64, duration_nanos: i64) -> Self {
        Self {
            start_nanos,
            duration_nanos: duration_nanos.max(0),
        }
    }

    /// End of the recording in epoch nanoseconds
    pub fn end_nanos(&self) -> i64 {
        self.start_nanos.saturating_add(self.duration_nanos)
    }

    /// Start time truncated to epoch milliseconds
    pub fn start_millis(&self) -> i64 {
        nanos_to_millis(self.start_nanos)
    }

    /// Duration truncated to milliseconds
    pub fn duration_millis(&self) -> i64 {
        nanos_to_millis(self.duration_nanos)
    }

    /// Check if a timestamp lies within `[start, start + duration]`
    pub fn covers(&self, timestamp_nanos: i64) -> bool {
        timestamp_nanos >= self.start_nanos && timestamp_nanos <= self.end_nanos()
    }

    /// Smallest metadata that covers both these bounds and a timestamp
    pub fn widened_to(&self, timestamp_nanos: i64) -> Self {
        let start = self.start_nanos.min(timestamp_nanos);
        let end = self.end_nanos().max(timestamp_nanos);
        Self::new(start, end.saturating_sub(start))
    }
}

/// Time range for queries (closed interval: [from, to]) in epoch milliseconds
///
/// A range with `from > to` is kept as-is and simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub from: i64,
    /// End timestamp (inclusive), in milliseconds
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Range that matches every timestamp
    pub fn unbounded() -> Self {
        Self {
            from: i64::MIN,
            to: i64::MAX,
        }
    }

    /// True when the range was inverted by the caller
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    /// Check if a millisecond timestamp falls within this range
    pub fn contains(&self, timestamp_millis: i64) -> bool {
        timestamp_millis >= self.from && timestamp_millis <= self.to
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::unbounded()
    }
}
