//! Query Executor
//!
//! Resolves every requested target independently against one index
//! snapshot:
//!
//! ```text
//! target ──▶ reserved name? ──yes──▶ one metadata point (range ignored)
//!               │ no
//!               ▼
//!            table shape? ──yes──▶ rows of the event type within range
//!               │ no
//!               ▼
//!            series within range (unknown target → no points)
//! ```
//!
//! The response has one element per target, in request order.

use crate::index::{IndexManager, RecordingIndex, SeriesPoint};
use crate::query::error::QueryResult;
use crate::query::model::{Query, QueryTarget, Shape};
use crate::query::response::{
    cell_value, Column, Datapoint, QueryResponseItem, Table, TimeSeries,
};
use crate::query::target::{table_event_type, ComputedMetric, Target};
use crate::recording::TimeRange;
use std::sync::Arc;
use std::time::Instant;

/// Runs queries against the current index snapshot
pub struct QueryExecutor {
    indexes: Arc<IndexManager>,
}

impl QueryExecutor {
    pub fn new(indexes: Arc<IndexManager>) -> Self {
        Self { indexes }
    }

    /// Execute a query against the current recording
    ///
    /// With no recording selected every target resolves empty. A recording
    /// that fails to parse is an error.
    pub async fn execute(&self, query: &Query) -> QueryResult<Vec<QueryResponseItem>> {
        let started = Instant::now();
        let snapshot = self.indexes.snapshot().await?;
        let result = execute_query(snapshot.as_deref().map(|s| &s.index), query);

        tracing::debug!(
            targets = query.targets.len(),
            recording = snapshot.as_deref().map(|s| s.recording.as_str()).unwrap_or(""),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Query executed"
        );

        Ok(result)
    }
}

/// Execute a query against an index, or against nothing
///
/// Pure: the same index and query always give the same result.
pub fn execute_query(index: Option<&RecordingIndex>, query: &Query) -> Vec<QueryResponseItem> {
    query
        .targets
        .iter()
        .map(|target| resolve_target(index, target, &query.range, query.max_data_points))
        .collect()
}

fn resolve_target(
    index: Option<&RecordingIndex>,
    target: &QueryTarget,
    range: &TimeRange,
    max_data_points: Option<usize>,
) -> QueryResponseItem {
    match (Target::parse(&target.name), target.shape) {
        (Target::Computed(metric), _) => {
            QueryResponseItem::Timeseries(computed_series(index, metric))
        }
        (_, Shape::Table) => QueryResponseItem::Table(match index {
            Some(index) => table(index, &target.name, range),
            None => Table::empty(),
        }),
        (_, Shape::Timeseries) => {
            let points = index
                .map(|index| index.series_in_range(&target.name, range))
                .unwrap_or_default();
            QueryResponseItem::Timeseries(TimeSeries {
                target: target.name.clone(),
                datapoints: decimate(points, max_data_points),
            })
        }
    }
}

fn computed_series(index: Option<&RecordingIndex>, metric: ComputedMetric) -> TimeSeries {
    let mut series = TimeSeries::empty(metric.name());
    if let Some(index) = index {
        let (value, timestamp) = metric.datapoint(&index.metadata());
        series.datapoints.push(Datapoint::new(value, timestamp));
    }
    series
}

/// Keep at most `max` points by taking every n-th one, ending on the last
fn decimate(points: &[SeriesPoint], max: Option<usize>) -> Vec<Datapoint> {
    let to_datapoint = |p: &SeriesPoint| Datapoint::new(p.value, p.timestamp_millis);

    let stride = match max {
        Some(max) if max > 0 && points.len() > max => points.len().div_ceil(max),
        _ => return points.iter().map(to_datapoint).collect(),
    };

    let mut kept: Vec<Datapoint> = points.iter().rev().step_by(stride).map(to_datapoint).collect();
    kept.reverse();
    kept
}

fn table(index: &RecordingIndex, target: &str, range: &TimeRange) -> Table {
    let Some(schema) = table_event_type(index, target).and_then(|t| index.schema(t)) else {
        return Table::empty();
    };

    let columns = schema
        .fields
        .iter()
        .map(|field| Column {
            text: field.name.to_string(),
            column_type: field.column_type(),
        })
        .collect();

    let rows = index
        .events_in_range(&schema.name, range)
        .iter()
        .map(|event| {
            schema
                .fields
                .iter()
                .map(|field| cell_value(event.get(&field.name)))
                .collect()
        })
        .collect();

    Table::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Event, FieldValue, RecordingMetadata};
    use serde_json::{json, Value};

    fn cpu_index() -> RecordingIndex {
        let events = vec![
            Event::at_millis("jdk.CPULoad", 100).field("user", 0.1),
            Event::at_millis("jdk.CPULoad", 200).field("user", 0.2),
            Event::at_millis("jdk.CPULoad", 300).field("user", 0.3),
        ];
        RecordingIndex::build(events, RecordingMetadata::new(100_000_000, 200_000_000))
    }

    fn to_json(items: &[QueryResponseItem]) -> Value {
        serde_json::to_value(items).unwrap()
    }

    #[test]
    fn test_cpu_load_range() {
        let index = cpu_index();
        let query = Query::targets(&["jdk.CPULoad.user"]).range(150, 300).build();

        let result = execute_query(Some(&index), &query);
        assert_eq!(
            to_json(&result),
            json!([{"target": "jdk.CPULoad.user", "datapoints": [[0.2, 200], [0.3, 300]]}])
        );
    }

    #[test]
    fn test_unknown_target_is_empty_series() {
        let index = cpu_index();
        let query = Query::targets(&["jdk.CPULoad.user", "jdk.Nope.value", "garbage"]).build();

        let result = execute_query(Some(&index), &query);
        assert_eq!(result.len(), 3);
        assert_eq!(
            to_json(&result[1..]),
            json!([
                {"target": "jdk.Nope.value", "datapoints": []},
                {"target": "garbage", "datapoints": []}
            ])
        );
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let index = cpu_index();
        let query = Query::targets(&["jdk.CPULoad.user"]).range(300, 100).build();

        let result = execute_query(Some(&index), &query);
        assert_eq!(
            result[0],
            QueryResponseItem::Timeseries(TimeSeries::empty("jdk.CPULoad.user"))
        );
    }

    #[test]
    fn test_computed_metrics_ignore_range() {
        let index = cpu_index();
        let query = Query::targets(&["recording_duration", "recording_start_time"])
            .range(0, 1)
            .build();

        let result = execute_query(Some(&index), &query);
        assert_eq!(
            to_json(&result),
            json!([
                {"target": "recording_duration", "datapoints": [[200, 100]]},
                {"target": "recording_start_time", "datapoints": [[100, 100]]}
            ])
        );
    }

    #[test]
    fn test_empty_recording_duration() {
        let index = RecordingIndex::build(Vec::new(), RecordingMetadata::new(5_000_000_000, 0));
        let query = Query::targets(&["recording_duration"]).build();

        let result = execute_query(Some(&index), &query);
        assert_eq!(
            to_json(&result),
            json!([{"target": "recording_duration", "datapoints": [[0, 5000]]}])
        );
    }

    #[test]
    fn test_no_recording_yields_empty_results() {
        let query = Query::targets(&["recording_duration", "jdk.CPULoad.user"])
            .target("jdk.ExecutionSample", Some(Shape::Table))
            .build();

        let result = execute_query(None, &query);
        assert_eq!(
            to_json(&result),
            json!([
                {"target": "recording_duration", "datapoints": []},
                {"target": "jdk.CPULoad.user", "datapoints": []},
                {"columns": [], "rows": [], "type": "table"}
            ])
        );
    }

    #[test]
    fn test_execution_sample_table() {
        let events = vec![
            Event::at_millis("jdk.ExecutionSample", 20)
                .field("stackTrace", "Worker.run()")
                .field("state", "STATE_RUNNABLE"),
            Event::at_millis("jdk.ExecutionSample", 10)
                .field("stackTrace", "Main.main()")
                .field("state", "STATE_SLEEPING"),
            Event::at_millis("jdk.CPULoad", 15).field("user", 0.5),
        ];
        let index = RecordingIndex::build(events, RecordingMetadata::default());
        let query = Query::targets(&["jdk.ExecutionSample"]).table().build();

        let result = execute_query(Some(&index), &query);
        assert_eq!(
            to_json(&result),
            json!([{
                "columns": [
                    {"text": "stackTrace", "type": "string"},
                    {"text": "state", "type": "string"}
                ],
                "rows": [
                    ["Main.main()", "STATE_SLEEPING"],
                    ["Worker.run()", "STATE_RUNNABLE"]
                ],
                "type": "table"
            }])
        );
    }

    #[test]
    fn test_table_column_types_and_missing_cells() {
        let events = vec![
            Event::at_millis("jdk.GCPhasePause", 1)
                .field("name", FieldValue::Null)
                .field("duration", FieldValue::Duration(2_000_000)),
            Event::at_millis("jdk.GCPhasePause", 2)
                .field("name", FieldValue::Null)
                .field("duration", FieldValue::Duration(500_000))
                .field("concurrent", false),
        ];
        let index = RecordingIndex::build(events, RecordingMetadata::default());
        let query = Query::targets(&["jdk.GCPhasePause.duration"])
            .table()
            .range(0, 5)
            .build();

        let result = execute_query(Some(&index), &query);
        assert_eq!(
            to_json(&result),
            json!([{
                "columns": [
                    {"text": "name", "type": "string"},
                    {"text": "duration", "type": "number"},
                    {"text": "concurrent", "type": "boolean"}
                ],
                "rows": [[null, 2, null], [null, 0.5, false]],
                "type": "table"
            }])
        );
    }

    #[test]
    fn test_max_data_points_keeps_last() {
        let events: Vec<Event> = (0..10)
            .map(|i| Event::at_millis("jdk.CPULoad", i).field("user", i as f64))
            .collect();
        let index = RecordingIndex::build(events, RecordingMetadata::default());
        let query = Query::targets(&["jdk.CPULoad.user"])
            .max_data_points(4)
            .build();

        let result = execute_query(Some(&index), &query);
        let QueryResponseItem::Timeseries(series) = &result[0] else {
            panic!("expected timeseries");
        };
        let timestamps: Vec<i64> = series.datapoints.iter().map(|d| d.timestamp_millis).collect();
        assert_eq!(timestamps, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_datapoints_sorted_and_in_range() {
        let events: Vec<Event> = [5, 3, 9, 1, 7, 3]
            .iter()
            .map(|&ms| Event::at_millis("t", ms).field("v", ms as f64))
            .collect();
        let index = RecordingIndex::build(events, RecordingMetadata::default());

        for (from, to) in [(0, 10), (3, 7), (4, 4), (8, 2)] {
            let query = Query::targets(&["t.v"]).range(from, to).build();
            let result = execute_query(Some(&index), &query);
            let QueryResponseItem::Timeseries(series) = &result[0] else {
                panic!("expected timeseries");
            };
            let ts: Vec<i64> = series.datapoints.iter().map(|d| d.timestamp_millis).collect();
            assert!(ts.windows(2).all(|w| w[0] <= w[1]));
            assert!(ts.iter().all(|t| *t >= from && *t <= to));
        }
    }

    #[test]
    fn test_idempotent() {
        let index = cpu_index();
        let query = Query::targets(&["jdk.CPULoad.user", "recording_duration"])
            .target("jdk.CPULoad", Some(Shape::Table))
            .range(0, 1_000)
            .build();

        let first = serde_json::to_string(&execute_query(Some(&index), &query)).unwrap();
        let second = serde_json::to_string(&execute_query(Some(&index), &query)).unwrap();
        assert_eq!(first, second);
    }
}
