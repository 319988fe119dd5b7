//! Wire forms of search and query requests
//!
//! Dashboard datasources send loosely typed JSON: targets may be plain
//! strings or objects, and range bounds may be ISO-8601 strings, epoch
//! milliseconds (as numbers or strings) or relative expressions like
//! `now-6h`.

use crate::query::error::{QueryError, QueryResult};
use crate::query::model::{Query, Search, Shape};
use crate::recording::TimeRange;
use chrono::Utc;
use serde::Deserialize;

/// POST /query body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub range: Option<RangeRequest>,
    #[serde(default)]
    pub targets: Vec<TargetRequest>,
    /// Default shape for targets without their own
    #[serde(rename = "type", default)]
    pub shape: Option<Shape>,
    #[serde(default)]
    pub max_data_points: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeRequest {
    #[serde(default)]
    pub from: Option<TimeBound>,
    #[serde(default)]
    pub to: Option<TimeBound>,
}

/// A range endpoint as sent by the client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimeBound {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

/// A target, either `"name"` or `{"target": "name", "type": "table", "refId": "A"}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TargetRequest {
    Name(String),
    Detailed {
        #[serde(default)]
        target: String,
        #[serde(rename = "type", default)]
        shape: Option<Shape>,
        #[serde(rename = "refId", default)]
        ref_id: Option<String>,
    },
}

impl TargetRequest {
    pub fn name(&self) -> &str {
        match self {
            TargetRequest::Name(name) => name,
            TargetRequest::Detailed { target, .. } => target,
        }
    }
}

impl QueryRequest {
    /// Resolve against the current wall clock
    pub fn into_query(self) -> QueryResult<Query> {
        self.into_query_at(Utc::now().timestamp_millis())
    }

    /// Resolve with `now` fixed to the given epoch milliseconds
    pub fn into_query_at(self, now_millis: i64) -> QueryResult<Query> {
        let range = match &self.range {
            Some(range) => TimeRange::new(
                resolve_bound(range.from.as_ref(), i64::MIN, now_millis)?,
                resolve_bound(range.to.as_ref(), i64::MAX, now_millis)?,
            ),
            None => TimeRange::unbounded(),
        };

        let mut builder = Query::targets(&[])
            .shape(self.shape.unwrap_or_default())
            .time_range(range);
        for target in self.targets {
            builder = match target {
                TargetRequest::Name(name) => builder.target(name, None),
                TargetRequest::Detailed { target, shape, .. } => builder.target(target, shape),
            };
        }
        if let Some(max) = self.max_data_points {
            builder = builder.max_data_points(max);
        }

        Ok(builder.build())
    }
}

fn resolve_bound(bound: Option<&TimeBound>, default: i64, now_millis: i64) -> QueryResult<i64> {
    match bound {
        None => Ok(default),
        Some(TimeBound::Millis(ms)) => Ok(*ms),
        Some(TimeBound::Fractional(ms)) => Ok(ms.floor() as i64),
        Some(TimeBound::Text(text)) => parse_timestamp(text, now_millis),
    }
}

/// Parse a timestamp string into epoch milliseconds
pub fn parse_timestamp(s: &str, now_millis: i64) -> QueryResult<i64> {
    let s = s.trim();

    // Raw milliseconds first
    if let Ok(ts) = s.parse::<i64>() {
        return Ok(ts);
    }

    if s.starts_with("now") {
        return parse_relative_time(s, now_millis);
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }

    // ISO 8601 without timezone (assume UTC)
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    if let Some(ts) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(ts.and_utc().timestamp_millis());
    }

    Err(QueryError::InvalidRequest(format!(
        "Cannot parse timestamp: {}",
        s
    )))
}

/// Parse relative time like "now-6h"
fn parse_relative_time(s: &str, now_millis: i64) -> QueryResult<i64> {
    if s == "now" {
        return Ok(now_millis);
    }

    let re = regex::Regex::new(r"^now-(\d+)([smhdwMy])$")
        .map_err(|e| QueryError::Internal(format!("Regex error: {}", e)))?;

    let caps = re.captures(s).ok_or_else(|| {
        QueryError::InvalidRequest(format!("Cannot parse relative time: {}", s))
    })?;
    let amount: i64 = caps[1].parse().map_err(|_| {
        QueryError::InvalidRequest("Invalid number in time expression".to_string())
    })?;

    let unit_ms: i64 = match &caps[2] {
        "s" => 1_000,
        "m" => 60 * 1_000,
        "h" => 3_600 * 1_000,
        "d" => 24 * 3_600 * 1_000,
        "w" => 7 * 24 * 3_600 * 1_000,
        "M" => 30 * 24 * 3_600 * 1_000,
        _ => 365 * 24 * 3_600 * 1_000,
    };

    Ok(now_millis.saturating_sub(amount.saturating_mul(unit_ms)))
}

/// Search kinds accepted in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Target,
    Events,
    Fields,
}

/// POST /search body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<SearchKind>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(rename = "eventType", default)]
    pub event_type: Option<String>,
}

impl SearchRequest {
    pub fn into_search(self) -> QueryResult<Search> {
        match self.kind.unwrap_or(SearchKind::Target) {
            SearchKind::Target => Ok(Search::targets(self.target.as_deref())),
            SearchKind::Events => Ok(Search::events(self.target.as_deref())),
            SearchKind::Fields => self
                .event_type
                .map(Search::fields)
                .ok_or_else(|| {
                    QueryError::InvalidRequest("fields search requires eventType".to_string())
                }),
        }
    }
}
