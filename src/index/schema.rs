//! Event type schemas
//!
//! A schema is inferred from the events actually observed, not from the
//! declarations in the file: a field exists once some event carries it,
//! and its kind is that of the first non-null value.

use crate::recording::{Event, ValueKind};
use std::sync::Arc;

/// One observed field of an event type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: Arc<str>,
    /// Kind of the first non-null value, `None` while only nulls were seen
    pub kind: Option<ValueKind>,
}

impl FieldSchema {
    /// Whether this field yields a time series
    pub fn is_series(&self) -> bool {
        self.kind.map_or(false, |kind| kind.is_series())
    }

    /// Column type for table output; all-null columns are strings
    pub fn column_type(&self) -> &'static str {
        self.kind.map_or("string", |kind| kind.column_type())
    }
}

/// Observed fields of one event type, in first-seen order
#[derive(Debug, Clone, PartialEq)]
pub struct EventTypeSchema {
    pub name: Arc<str>,
    pub fields: Vec<FieldSchema>,
    /// Number of events of this type
    pub event_count: usize,
}

impl EventTypeSchema {
    pub fn new(name: Arc<str>) -> Self {
        Self {
            name,
            fields: Vec::new(),
            event_count: 0,
        }
    }

    /// Fold one event into the schema
    pub fn observe(&mut self, event: &Event) {
        self.event_count += 1;

        for (name, value) in &event.fields {
            match self.fields.iter_mut().find(|f| f.name == *name) {
                Some(field) => {
                    if field.kind.is_none() {
                        field.kind = value.kind();
                    }
                }
                None => self.fields.push(FieldSchema {
                    name: Arc::clone(name),
                    kind: value.kind(),
                }),
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name.as_ref() == name)
    }

    /// Fields usable as time series
    pub fn series_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.is_series())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::FieldValue;

    #[test]
    fn test_first_seen_order() {
        let mut schema = EventTypeSchema::new("jdk.ExecutionSample".into());
        schema.observe(
            &Event::new("jdk.ExecutionSample", 1)
                .field("stackTrace", "main()")
                .field("state", "RUNNABLE"),
        );
        schema.observe(
            &Event::new("jdk.ExecutionSample", 2)
                .field("sampledThread", "worker-1")
                .field("stackTrace", "run()"),
        );

        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_ref()).collect();
        assert_eq!(names, vec!["stackTrace", "state", "sampledThread"]);
        assert_eq!(schema.event_count, 2);
    }

    #[test]
    fn test_kind_from_first_non_null() {
        let mut schema = EventTypeSchema::new("jdk.ThreadPark".into());
        schema.observe(&Event::new("jdk.ThreadPark", 1).field("parkedClass", FieldValue::Null));
        assert_eq!(schema.field("parkedClass").unwrap().column_type(), "string");

        schema.observe(&Event::new("jdk.ThreadPark", 2).field("parkedClass", 3.0));
        schema.observe(&Event::new("jdk.ThreadPark", 3).field("parkedClass", "Lock"));

        let field = schema.field("parkedClass").unwrap();
        assert_eq!(field.kind, Some(ValueKind::Numeric));
        assert!(field.is_series());
    }

    #[test]
    fn test_series_fields() {
        let mut schema = EventTypeSchema::new("jdk.GCPhasePause".into());
        schema.observe(
            &Event::new("jdk.GCPhasePause", 1)
                .field("name", "GC Pause")
                .field("duration", FieldValue::Duration(1_000))
                .field("gcId", 7i64),
        );

        let series: Vec<&str> = schema.series_fields().map(|f| f.name.as_ref()).collect();
        assert_eq!(series, vec!["duration", "gcId"]);
    }
}
