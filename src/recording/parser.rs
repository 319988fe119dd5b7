//! Recording reader
//!
//! Opening a recording validates every chunk header and body checksum,
//! which is enough to answer metadata questions. Events are decoded lazily,
//! one chunk at a time, by the iterator returned from [`Recording::events`].

use crate::recording::compression::{body_checksum, decode_body};
use crate::recording::error::{RecordingError, RecordingResult};
use crate::recording::format::{ByteReader, ChunkHeader, FieldKind, HEADER_SIZE};
use crate::recording::types::{Event, FieldValue, RecordingMetadata};
use std::collections::HashMap;
use std::io::Read;
use std::iter::FusedIterator;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// A validated chunk and the location of its stored body
#[derive(Debug, Clone)]
struct ChunkRef {
    header: ChunkHeader,
    body: Range<usize>,
}

/// An opened recording
#[derive(Debug)]
pub struct Recording {
    data: Vec<u8>,
    chunks: Vec<ChunkRef>,
    metadata: RecordingMetadata,
}

impl Recording {
    /// Validate a recording held in memory
    pub fn from_bytes(data: Vec<u8>) -> RecordingResult<Self> {
        let started = Instant::now();

        if data.is_empty() {
            return Err(RecordingError::malformed("Empty input"));
        }

        let mut chunks = Vec::new();
        let mut offset = 0usize;

        while offset < data.len() {
            let header = ChunkHeader::from_bytes(&data[offset..]).map_err(|e| match e {
                RecordingError::Malformed(msg) => {
                    RecordingError::malformed(format!("Chunk at offset {}: {}", offset, msg))
                }
                other => other,
            })?;

            let available = (data.len() - offset) as u64;
            if header.chunk_size > available {
                return Err(RecordingError::malformed(format!(
                    "Truncated chunk at offset {}: declared {} bytes, {} available",
                    offset, header.chunk_size, available
                )));
            }

            let body = offset + HEADER_SIZE..offset + header.chunk_size as usize;
            let actual = body_checksum(&data[body.clone()]);
            if actual != header.body_checksum {
                return Err(RecordingError::malformed(format!(
                    "Checksum mismatch in chunk at offset {}: expected {:08x}, got {:08x}",
                    offset, header.body_checksum, actual
                )));
            }

            offset = body.end;
            chunks.push(ChunkRef { header, body });
        }

        let metadata = metadata_from_headers(&chunks);

        tracing::debug!(
            bytes = data.len(),
            chunks = chunks.len(),
            start_nanos = metadata.start_nanos,
            duration_nanos = metadata.duration_nanos,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Recording opened"
        );

        Ok(Self {
            data,
            chunks,
            metadata,
        })
    }

    /// Read a whole stream and validate it
    pub fn from_reader<R: Read>(mut reader: R) -> RecordingResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Open a recording file
    pub fn open(path: impl AsRef<Path>) -> RecordingResult<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Recording-wide start and duration, from chunk headers only
    pub fn metadata(&self) -> RecordingMetadata {
        self.metadata
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total number of events declared by the chunk headers
    pub fn declared_event_count(&self) -> u64 {
        self.chunks
            .iter()
            .map(|chunk| u64::from(chunk.header.event_count))
            .sum()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Lazily decode events in file order
    ///
    /// Each call starts again from the first chunk. The iterator yields at
    /// most one error and then ends.
    pub fn events(&self) -> Events<'_> {
        Events {
            recording: self,
            next_chunk: 0,
            current: None,
            failed: false,
        }
    }

    /// Decode every event, failing on the first malformed record
    pub fn collect_events(&self) -> RecordingResult<Vec<Event>> {
        self.events().collect()
    }
}

fn metadata_from_headers(chunks: &[ChunkRef]) -> RecordingMetadata {
    let start = chunks
        .iter()
        .map(|c| c.header.start_nanos)
        .min()
        .unwrap_or_default();
    let end = chunks
        .iter()
        .map(|c| c.header.end_nanos())
        .max()
        .unwrap_or(start);
    RecordingMetadata::new(start, end.saturating_sub(start))
}

/// Event type as declared in a chunk's metadata section
#[derive(Debug)]
struct DeclaredType {
    name: Arc<str>,
    fields: Vec<(Arc<str>, FieldKind)>,
}

/// Decoding state for one chunk
struct ChunkDecoder {
    header: ChunkHeader,
    body: Vec<u8>,
    pos: usize,
    types: HashMap<u64, DeclaredType>,
    decoded: u32,
}

impl ChunkDecoder {
    fn new(chunk: &ChunkRef, stored: &[u8]) -> RecordingResult<Self> {
        let body = decode_body(&chunk.header, stored)?;
        let mut reader = ByteReader::new(&body);
        let types = read_metadata(&mut reader)?;
        let pos = reader.position();

        Ok(Self {
            header: chunk.header.clone(),
            body,
            pos,
            types,
            decoded: 0,
        })
    }

    fn next_event(&mut self) -> RecordingResult<Option<Event>> {
        if self.decoded == self.header.event_count {
            let trailing = self.body.len() - self.pos;
            if trailing > 0 {
                return Err(RecordingError::malformed(format!(
                    "{} trailing bytes after the last of {} events",
                    trailing, self.header.event_count
                )));
            }
            return Ok(None);
        }

        let mut reader = ByteReader::new(&self.body[self.pos..]);
        if reader.is_empty() {
            return Err(RecordingError::malformed(format!(
                "Chunk ended after {} of {} events",
                self.decoded, self.header.event_count
            )));
        }

        let size = reader.read_len()?;
        let record = reader.take(size)?;
        let event = self.decode_record(record).map_err(|e| match e {
            RecordingError::Malformed(msg) => RecordingError::malformed(format!(
                "Event record {} of {}: {}",
                self.decoded + 1,
                self.header.event_count,
                msg
            )),
            other => other,
        })?;

        self.pos += reader.position();
        self.decoded += 1;
        Ok(Some(event))
    }

    fn decode_record(&self, record: &[u8]) -> RecordingResult<Event> {
        let mut reader = ByteReader::new(record);
        let type_id = reader.read_varint()?;
        let declared = self.types.get(&type_id).ok_or_else(|| {
            RecordingError::malformed(format!("Unknown event type id: {}", type_id))
        })?;
        let ticks = reader.read_signed()?;

        let mut fields = Vec::with_capacity(declared.fields.len());
        for (name, kind) in &declared.fields {
            let value = match kind {
                FieldKind::Long => FieldValue::Numeric(reader.read_signed()? as f64),
                FieldKind::Double => FieldValue::Numeric(reader.read_f64()?),
                FieldKind::Boolean => FieldValue::Bool(reader.read_u8()? != 0),
                FieldKind::String => match reader.read_string()? {
                    Some(text) => FieldValue::Text(text),
                    None => FieldValue::Null,
                },
                FieldKind::Duration => {
                    FieldValue::Duration(self.header.ticks_to_duration(reader.read_signed()?))
                }
            };
            fields.push((Arc::clone(name), value));
        }

        if !reader.is_empty() {
            return Err(RecordingError::malformed(format!(
                "{} unread bytes at end of record",
                reader.remaining()
            )));
        }

        Ok(Event {
            event_type: Arc::clone(&declared.name),
            timestamp_nanos: self.header.ticks_to_nanos(ticks),
            fields,
        })
    }
}

fn read_metadata(reader: &mut ByteReader<'_>) -> RecordingResult<HashMap<u64, DeclaredType>> {
    let type_count = reader.read_len()?;
    let mut types = HashMap::new();

    for _ in 0..type_count {
        let id = reader.read_varint()?;
        let name: Arc<str> = reader.read_name()?.into();
        let field_count = reader.read_len()?;

        let mut fields = Vec::new();
        for _ in 0..field_count {
            let field: Arc<str> = reader.read_name()?.into();
            let kind = FieldKind::try_from(reader.read_u8()?)?;
            fields.push((field, kind));
        }

        if types.insert(id, DeclaredType { name, fields }).is_some() {
            return Err(RecordingError::malformed(format!(
                "Duplicate type id: {}",
                id
            )));
        }
    }

    Ok(types)
}

/// Lazy event iterator over a [`Recording`]
pub struct Events<'a> {
    recording: &'a Recording,
    next_chunk: usize,
    current: Option<ChunkDecoder>,
    failed: bool,
}

impl Iterator for Events<'_> {
    type Item = RecordingResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(decoder) = self.current.as_mut() {
                match decoder.next_event() {
                    Ok(Some(event)) => return Some(Ok(event)),
                    Ok(None) => self.current = None,
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }

            let chunk = self.recording.chunks.get(self.next_chunk)?;
            self.next_chunk += 1;

            match ChunkDecoder::new(chunk, &self.recording.data[chunk.body.clone()]) {
                Ok(decoder) => self.current = Some(decoder),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl FusedIterator for Events<'_> {}
