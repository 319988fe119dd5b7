//! Recording Index
//!
//! Immutable, query-ready view of one parsed recording:
//!
//! ```text
//! events ──▶ group by type ──▶ stable sort by time ──▶ schemas
//!                                       │
//!                                       └──▶ "type.field" → [(ms, value)]
//! ```
//!
//! Series are kept sorted by timestamp, so range lookups are two binary
//! searches. Ties keep parse order.

use crate::index::schema::EventTypeSchema;
use crate::recording::{
    nanos_to_millis, Event, Recording, RecordingMetadata, RecordingResult, TimeRange,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// One sample of a numeric series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Epoch milliseconds (truncated)
    pub timestamp_millis: i64,
    pub value: f64,
}

/// Summary of an index, used by the CLI and health output
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub event_count: usize,
    pub event_types: usize,
    pub series: usize,
    pub start_millis: i64,
    pub duration_millis: i64,
}

/// Index over all events of one recording generation
#[derive(Debug, Default)]
pub struct RecordingIndex {
    metadata: RecordingMetadata,
    schemas: BTreeMap<Arc<str>, EventTypeSchema>,
    /// Events per type, ascending by timestamp
    events: BTreeMap<Arc<str>, Vec<Event>>,
    /// "type.field" → samples, ascending by timestamp
    series: BTreeMap<String, Vec<SeriesPoint>>,
    event_count: usize,
}

impl RecordingIndex {
    /// Build an index from parsed events
    ///
    /// The metadata bounds are widened where needed so that every event
    /// lies within `[start, start + duration]`.
    pub fn build(events: impl IntoIterator<Item = Event>, metadata: RecordingMetadata) -> Self {
        let mut metadata = metadata;
        let mut by_type: BTreeMap<Arc<str>, Vec<Event>> = BTreeMap::new();
        let mut event_count = 0;

        for event in events {
            if !metadata.covers(event.timestamp_nanos) {
                metadata = metadata.widened_to(event.timestamp_nanos);
            }
            event_count += 1;
            by_type
                .entry(Arc::clone(&event.event_type))
                .or_default()
                .push(event);
        }

        let mut schemas = BTreeMap::new();
        let mut series = BTreeMap::new();

        for (name, events) in by_type.iter_mut() {
            // sort_by_key is stable: equal timestamps keep parse order
            events.sort_by_key(|e| e.timestamp_nanos);

            let mut schema = EventTypeSchema::new(Arc::clone(name));
            for event in events.iter() {
                schema.observe(event);
            }

            for field in schema.series_fields() {
                let points: Vec<SeriesPoint> = events
                    .iter()
                    .filter_map(|event| {
                        let value = event.get(&field.name)?.as_series_value()?;
                        Some(SeriesPoint {
                            timestamp_millis: event.timestamp_millis(),
                            value,
                        })
                    })
                    .collect();
                series.insert(format!("{}.{}", name, field.name), points);
            }

            schemas.insert(Arc::clone(name), schema);
        }

        Self {
            metadata,
            schemas,
            events: by_type,
            series,
            event_count,
        }
    }

    /// Decode every event of a recording and index them
    ///
    /// Decoding completes before anything is built, so a malformed
    /// recording never yields a partial index.
    pub fn from_recording(recording: &Recording) -> RecordingResult<Self> {
        let started = Instant::now();
        let events = recording.collect_events()?;
        let index = Self::build(events, recording.metadata());

        tracing::info!(
            events = index.event_count,
            event_types = index.schemas.len(),
            series = index.series.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recording indexed"
        );

        Ok(index)
    }

    pub fn metadata(&self) -> RecordingMetadata {
        self.metadata
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Event type names, sorted
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(|name| name.as_ref())
    }

    pub fn schema(&self, event_type: &str) -> Option<&EventTypeSchema> {
        self.schemas.get(event_type)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &EventTypeSchema> {
        self.schemas.values()
    }

    /// Series targets (`type.field`), sorted
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|target| target.as_str())
    }

    /// All samples of a series target
    pub fn series(&self, target: &str) -> Option<&[SeriesPoint]> {
        self.series.get(target).map(|points| points.as_slice())
    }

    /// Samples of a series target within a time range
    pub fn series_in_range(&self, target: &str, range: &TimeRange) -> &[SeriesPoint] {
        let points = self.series(target).unwrap_or_default();
        if range.is_empty() {
            return &[];
        }
        let lo = points.partition_point(|p| p.timestamp_millis < range.from);
        let hi = points.partition_point(|p| p.timestamp_millis <= range.to);
        &points[lo..hi.max(lo)]
    }

    /// Events of one type within a time range, ascending by timestamp
    pub fn events_in_range(&self, event_type: &str, range: &TimeRange) -> &[Event] {
        let events = self
            .events
            .get(event_type)
            .map(|events| events.as_slice())
            .unwrap_or_default();
        if range.is_empty() {
            return &[];
        }
        let lo = events.partition_point(|e| nanos_to_millis(e.timestamp_nanos) < range.from);
        let hi = events.partition_point(|e| nanos_to_millis(e.timestamp_nanos) <= range.to);
        &events[lo..hi.max(lo)]
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            event_count: self.event_count,
            event_types: self.schemas.len(),
            series: self.series.len(),
            start_millis: self.metadata.start_millis(),
            duration_millis: self.metadata.duration_millis(),
        }
    }
}
