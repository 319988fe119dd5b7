//! Query and search response shapes
//!
//! Serialized exactly as dashboard datasources expect:
//!
//! ```text
//! timeseries: {"target": "jdk.CPULoad.user", "datapoints": [[0.2, 200], [0.3, 300]]}
//! table:      {"columns": [{"text": "state", "type": "string"}], "rows": [["RUNNABLE"]], "type": "table"}
//! ```
//!
//! Integral numbers are written as JSON integers.

use crate::recording::FieldValue;
use serde::ser::{Serialize, SerializeTuple, Serializer};
use serde_json::Value;

/// Largest integer an f64 represents exactly
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// JSON number for a sample value; non-finite values become null
pub fn number_value(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// JSON cell for a table row
pub fn cell_value(value: Option<&FieldValue>) -> Value {
    match value {
        Some(FieldValue::Numeric(v)) => number_value(*v),
        Some(FieldValue::Duration(_)) => value
            .and_then(FieldValue::as_series_value)
            .map(number_value)
            .unwrap_or(Value::Null),
        Some(FieldValue::Text(s)) => Value::String(s.clone()),
        Some(FieldValue::Bool(b)) => Value::Bool(*b),
        Some(FieldValue::Null) | None => Value::Null,
    }
}

/// One `[value, epochMillis]` pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    pub value: f64,
    pub timestamp_millis: i64,
}

impl Datapoint {
    pub fn new(value: f64, timestamp_millis: i64) -> Self {
        Self {
            value,
            timestamp_millis,
        }
    }
}

impl Serialize for Datapoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&number_value(self.value))?;
        tuple.serialize_element(&self.timestamp_millis)?;
        tuple.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TimeSeries {
    pub target: String,
    pub datapoints: Vec<Datapoint>,
}

impl TimeSeries {
    pub fn empty(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            datapoints: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Column {
    pub text: String,
    #[serde(rename = "type")]
    pub column_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl Table {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            kind: "table",
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// One element of the query response array
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum QueryResponseItem {
    Timeseries(TimeSeries),
    Table(Table),
}

/// `{text, value}` pair returned by target completion
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TargetOption {
    pub text: String,
    pub value: String,
}

impl TargetOption {
    pub fn new(target: impl Into<String>) -> Self {
        let text = target.into();
        Self {
            value: text.clone(),
            text,
        }
    }
}

/// Search response: completion options or plain names
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Targets(Vec<TargetOption>),
    Names(Vec<String>),
}

impl SearchResponse {
    /// The matched strings, whatever the shape
    pub fn names(&self) -> Vec<&str> {
        match self {
            SearchResponse::Targets(options) => options.iter().map(|o| o.text.as_str()).collect(),
            SearchResponse::Names(names) => names.iter().map(|n| n.as_str()).collect(),
        }
    }
}
