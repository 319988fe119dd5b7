//! Recording writer
//!
//! Produces the chunked container read by [`Recording`](super::Recording).
//! Used by the CLI demo generator, benchmarks and tests.

use crate::recording::compression::{body_checksum, encode_body};
use crate::recording::error::{RecordingError, RecordingResult};
use crate::recording::format::{
    write_signed, write_string, write_varint, ChunkHeader, FieldKind, HEADER_SIZE,
};
use crate::recording::types::{Event, FieldValue, ValueKind};
use std::collections::HashMap;
use std::path::Path;

/// Default tick rate: one tick per nanosecond
pub const DEFAULT_TICKS_PER_SECOND: i64 = 1_000_000_000;

#[derive(Debug, Clone)]
struct TypeDecl {
    id: u64,
    name: String,
    fields: Vec<(String, FieldKind)>,
}

/// Events buffered for the chunk being written
#[derive(Debug, Default)]
struct PendingChunk {
    start_nanos: i64,
    last_event_nanos: Option<i64>,
    event_count: u32,
    records: Vec<u8>,
}

/// Builds a recording chunk by chunk
#[derive(Debug)]
pub struct RecordingWriter {
    ticks_per_second: i64,
    compress: bool,
    end_nanos: Option<i64>,
    types: Vec<TypeDecl>,
    type_ids: HashMap<String, usize>,
    output: Vec<u8>,
    chunk_count: usize,
    pending: PendingChunk,
}

impl RecordingWriter {
    /// Create a writer for a recording starting at `start_nanos`
    pub fn new(start_nanos: i64) -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            compress: false,
            end_nanos: None,
            types: Vec::new(),
            type_ids: HashMap::new(),
            output: Vec::new(),
            chunk_count: 0,
            pending: PendingChunk {
                start_nanos,
                ..Default::default()
            },
        }
    }

    /// Builder method: set the tick rate (must be positive)
    pub fn ticks_per_second(mut self, ticks_per_second: i64) -> Self {
        self.ticks_per_second = ticks_per_second.max(1);
        self
    }

    /// Builder method: LZ4-compress chunk bodies
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Builder method: declare the recording duration
    ///
    /// The final chunk is stretched to end at `start + duration_nanos`
    /// unless its events already extend further.
    pub fn duration(mut self, duration_nanos: i64) -> Self {
        self.end_nanos = Some(self.pending.start_nanos.saturating_add(duration_nanos.max(0)));
        self
    }

    /// Create a writer with types inferred from a set of events, and write them
    ///
    /// Field kinds come from the first non-null value seen per field:
    /// numbers become `Double`, text and all-null fields `String`.
    pub fn from_events(start_nanos: i64, events: &[Event]) -> RecordingResult<Self> {
        let mut declared: Vec<(String, Vec<(String, Option<ValueKind>)>)> = Vec::new();

        for event in events {
            let pos = match declared
                .iter()
                .position(|(name, _)| name.as_str() == event.event_type.as_ref())
            {
                Some(pos) => pos,
                None => {
                    declared.push((event.event_type.to_string(), Vec::new()));
                    declared.len() - 1
                }
            };
            let fields = &mut declared[pos].1;

            for (name, value) in &event.fields {
                match fields.iter_mut().find(|(field, _)| field.as_str() == name.as_ref()) {
                    Some((_, kind)) => {
                        if kind.is_none() {
                            *kind = value.kind();
                        }
                    }
                    None => fields.push((name.to_string(), value.kind())),
                }
            }
        }

        let mut writer = Self::new(start_nanos);
        for (name, fields) in &declared {
            let fields: Vec<(&str, FieldKind)> = fields
                .iter()
                .map(|(field, kind)| (field.as_str(), field_kind_for(*kind)))
                .collect();
            writer.declare_type(name, &fields)?;
        }
        for event in events {
            writer.write_event(event)?;
        }

        Ok(writer)
    }

    /// Declare an event type and its fields
    ///
    /// Redeclaring a type with identical fields is a no-op.
    pub fn declare_type(&mut self, name: &str, fields: &[(&str, FieldKind)]) -> RecordingResult<()> {
        let fields: Vec<(String, FieldKind)> = fields
            .iter()
            .map(|(field, kind)| (field.to_string(), *kind))
            .collect();

        if let Some(&idx) = self.type_ids.get(name) {
            if self.types[idx].fields == fields {
                return Ok(());
            }
            return Err(RecordingError::InvalidEvent(format!(
                "Type {} already declared with different fields",
                name
            )));
        }

        let idx = self.types.len();
        self.types.push(TypeDecl {
            id: idx as u64 + 1,
            name: name.to_string(),
            fields,
        });
        self.type_ids.insert(name.to_string(), idx);
        Ok(())
    }

    /// Append an event to the current chunk
    pub fn write_event(&mut self, event: &Event) -> RecordingResult<()> {
        let idx = *self
            .type_ids
            .get(event.event_type.as_ref())
            .ok_or_else(|| {
                RecordingError::InvalidEvent(format!("Undeclared event type: {}", event.event_type))
            })?;
        let decl = &self.types[idx];

        if let Some((name, _)) = event
            .fields
            .iter()
            .find(|(name, _)| !decl.fields.iter().any(|(field, _)| field.as_str() == name.as_ref()))
        {
            return Err(RecordingError::InvalidEvent(format!(
                "Field {} is not declared on {}",
                name, decl.name
            )));
        }

        let header = self.pending_header();
        let mut record = Vec::with_capacity(16 + decl.fields.len() * 8);
        write_varint(&mut record, decl.id);
        write_signed(
            &mut record,
            header.duration_to_ticks(event.timestamp_nanos.saturating_sub(header.start_nanos)),
        );
        for (field, kind) in &decl.fields {
            encode_value(&mut record, &header, &decl.name, field, *kind, event.get(field))?;
        }

        write_varint(&mut self.pending.records, record.len() as u64);
        self.pending.records.extend_from_slice(&record);
        self.pending.event_count += 1;
        self.pending.last_event_nanos = Some(
            self.pending
                .last_event_nanos
                .map_or(event.timestamp_nanos, |last| last.max(event.timestamp_nanos)),
        );
        Ok(())
    }

    /// Close the current chunk and start a new one where it ended
    pub fn new_chunk(&mut self) {
        let end = self.flush_chunk(false);
        self.pending = PendingChunk {
            start_nanos: end,
            ..Default::default()
        };
    }

    /// Number of events written to the chunk in progress
    pub fn pending_events(&self) -> u32 {
        self.pending.event_count
    }

    /// Finish the recording and return its bytes
    pub fn finish(mut self) -> Vec<u8> {
        self.flush_chunk(true);
        tracing::debug!(
            chunks = self.chunk_count,
            bytes = self.output.len(),
            "Recording written"
        );
        self.output
    }

    /// Finish the recording and write it to a file
    pub fn write_to(self, path: impl AsRef<Path>) -> RecordingResult<()> {
        std::fs::write(path, self.finish())?;
        Ok(())
    }

    fn pending_header(&self) -> ChunkHeader {
        ChunkHeader::new(self.pending.start_nanos, self.ticks_per_second)
    }

    /// Encode the pending chunk into the output, returning its end time
    fn flush_chunk(&mut self, last: bool) -> i64 {
        let start = self.pending.start_nanos;
        let mut end = self.pending.last_event_nanos.unwrap_or(start).max(start);
        if last {
            if let Some(declared_end) = self.end_nanos {
                end = end.max(declared_end);
            }
        }

        let mut body = Vec::with_capacity(self.pending.records.len() + 64);
        write_varint(&mut body, self.types.len() as u64);
        for decl in &self.types {
            write_varint(&mut body, decl.id);
            write_string(&mut body, Some(&decl.name));
            write_varint(&mut body, decl.fields.len() as u64);
            for (field, kind) in &decl.fields {
                write_string(&mut body, Some(field));
                body.push(*kind as u8);
            }
        }
        body.extend_from_slice(&self.pending.records);

        let (stored, features) = encode_body(&body, self.compress);

        let mut header = self.pending_header();
        header.chunk_size = (HEADER_SIZE + stored.len()) as u64;
        header.duration_nanos = end.saturating_sub(start);
        header.event_count = self.pending.event_count;
        header.features = features;
        header.body_checksum = body_checksum(&stored);

        self.output.extend_from_slice(&header.to_bytes());
        self.output.extend_from_slice(&stored);
        self.chunk_count += 1;

        end
    }
}

fn field_kind_for(kind: Option<ValueKind>) -> FieldKind {
    match kind {
        Some(ValueKind::Numeric) => FieldKind::Double,
        Some(ValueKind::Bool) => FieldKind::Boolean,
        Some(ValueKind::Duration) => FieldKind::Duration,
        Some(ValueKind::Text) | None => FieldKind::String,
    }
}

fn encode_value(
    out: &mut Vec<u8>,
    header: &ChunkHeader,
    type_name: &str,
    field: &str,
    kind: FieldKind,
    value: Option<&FieldValue>,
) -> RecordingResult<()> {
    let mismatch = || {
        RecordingError::InvalidEvent(format!(
            "Value for {}.{} does not match declared kind {:?}",
            type_name, field, kind
        ))
    };

    match (kind, value) {
        (FieldKind::Long, Some(FieldValue::Numeric(v))) if v.fract() == 0.0 => {
            write_signed(out, *v as i64)
        }
        (FieldKind::Double, Some(FieldValue::Numeric(v))) => out.extend_from_slice(&v.to_be_bytes()),
        (FieldKind::Boolean, Some(FieldValue::Bool(b))) => out.push(u8::from(*b)),
        (FieldKind::String, Some(FieldValue::Text(s))) => write_string(out, Some(s)),
        (FieldKind::String, Some(FieldValue::Null) | None) => write_string(out, None),
        (FieldKind::Duration, Some(FieldValue::Duration(nanos))) => {
            write_signed(out, header.duration_to_ticks(*nanos))
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}
