//! Target resolution
//!
//! A target is either a reserved computed name, checked first, or a
//! `eventType.fieldName` series. Event type names contain dots themselves,
//! so the field is whatever follows the last dot.

use crate::index::RecordingIndex;
use crate::recording::RecordingMetadata;

/// Recording-level metrics answered from metadata instead of events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedMetric {
    /// Value: duration in ms, at the recording start
    RecordingDuration,
    /// Value: start time in epoch ms, at the recording start
    RecordingStartTime,
}

/// Reserved target names
pub const COMPUTED_METRICS: &[(&str, ComputedMetric)] = &[
    ("recording_duration", ComputedMetric::RecordingDuration),
    ("recording_start_time", ComputedMetric::RecordingStartTime),
];

impl ComputedMetric {
    pub fn lookup(name: &str) -> Option<Self> {
        COMPUTED_METRICS
            .iter()
            .find(|(reserved, _)| *reserved == name)
            .map(|(_, metric)| *metric)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComputedMetric::RecordingDuration => "recording_duration",
            ComputedMetric::RecordingStartTime => "recording_start_time",
        }
    }

    /// The single `(value, timestamp_millis)` point of this metric
    pub fn datapoint(&self, metadata: &RecordingMetadata) -> (f64, i64) {
        let start = metadata.start_millis();
        match self {
            ComputedMetric::RecordingDuration => (metadata.duration_millis() as f64, start),
            ComputedMetric::RecordingStartTime => (start as f64, start),
        }
    }
}

/// A resolved target name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Computed(ComputedMetric),
    Field { event_type: &'a str, field: &'a str },
    /// Neither reserved nor of the `type.field` form
    Unknown(&'a str),
}

impl<'a> Target<'a> {
    pub fn parse(name: &'a str) -> Self {
        if let Some(metric) = ComputedMetric::lookup(name) {
            return Target::Computed(metric);
        }
        match name.rsplit_once('.') {
            Some((event_type, field)) if !event_type.is_empty() && !field.is_empty() => {
                Target::Field { event_type, field }
            }
            _ => Target::Unknown(name),
        }
    }
}

/// Event type addressed by a table target
///
/// A known event type name is used as-is; otherwise a trailing `.field`
/// is stripped.
pub fn table_event_type<'a>(index: &RecordingIndex, target: &'a str) -> Option<&'a str> {
    if index.schema(target).is_some() {
        return Some(target);
    }
    match Target::parse(target) {
        Target::Field { event_type, .. } if index.schema(event_type).is_some() => Some(event_type),
        _ => None,
    }
}
