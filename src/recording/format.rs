//! Recording container format
//!
//! A recording is a sequence of chunks laid end to end.
//!
//! Layout of one chunk:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (68 bytes, big-endian)           │
//! │   magic: [u8; 4] = "FLR\0"              │
//! │   major: u16 = 2                        │
//! │   minor: u16                            │
//! │   chunk_size: u64                       │
//! │   start_nanos: i64                      │
//! │   duration_nanos: i64                   │
//! │   start_ticks: i64                      │
//! │   ticks_per_second: i64                 │
//! │   event_count: u32                      │
//! │   features: u32 (bit 0 = LZ4 body)      │
//! │   body_checksum: u32                    │
//! │   reserved: [u8; 8]                     │
//! ├─────────────────────────────────────────┤
//! │ BODY (chunk_size - 68 bytes)            │
//! │   metadata: type declarations           │
//! │   events: size-prefixed records         │
//! └─────────────────────────────────────────┘
//! ```

use crate::recording::error::{RecordingError, RecordingResult};

/// Magic bytes for chunk identification
pub const CHUNK_MAGIC: [u8; 4] = *b"FLR\0";

/// Supported major format version
pub const MAJOR_VERSION: u16 = 2;

/// Minor version written by this crate
pub const MINOR_VERSION: u16 = 0;

/// Header size in bytes
pub const HEADER_SIZE: usize = 68;

/// Feature bit: body is LZ4 compressed with a prepended size
pub const FEATURE_LZ4: u32 = 1;

/// Longest valid LEB128 encoding of a u64
const MAX_VARINT_LEN: usize = 10;

const STRING_NULL: u8 = 0;
const STRING_EMPTY: u8 = 1;
const STRING_UTF8: u8 = 3;

/// Wire kind of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldKind {
    Long = 0,
    Double = 1,
    Boolean = 2,
    String = 3,
    Duration = 4,
}

impl TryFrom<u8> for FieldKind {
    type Error = RecordingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FieldKind::Long),
            1 => Ok(FieldKind::Double),
            2 => Ok(FieldKind::Boolean),
            3 => Ok(FieldKind::String),
            4 => Ok(FieldKind::Duration),
            _ => Err(RecordingError::malformed(format!(
                "Unknown field kind: {}",
                value
            ))),
        }
    }
}

/// Fixed-size chunk header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub major: u16,
    pub minor: u16,
    /// Total chunk size including this header
    pub chunk_size: u64,
    pub start_nanos: i64,
    pub duration_nanos: i64,
    pub start_ticks: i64,
    pub ticks_per_second: i64,
    pub event_count: u32,
    pub features: u32,
    /// CRC32 of the stored (possibly compressed) body
    pub body_checksum: u32,
}

impl ChunkHeader {
    /// Create a header for a chunk starting at `start_nanos`
    pub fn new(start_nanos: i64, ticks_per_second: i64) -> Self {
        Self {
            major: MAJOR_VERSION,
            minor: MINOR_VERSION,
            chunk_size: HEADER_SIZE as u64,
            start_nanos,
            duration_nanos: 0,
            start_ticks: 0,
            ticks_per_second,
            event_count: 0,
            features: 0,
            body_checksum: 0,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.features & FEATURE_LZ4 != 0
    }

    /// Size of the stored body in bytes
    pub fn body_size(&self) -> u64 {
        self.chunk_size.saturating_sub(HEADER_SIZE as u64)
    }

    /// End of the chunk in epoch nanoseconds
    pub fn end_nanos(&self) -> i64 {
        self.start_nanos.saturating_add(self.duration_nanos)
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&CHUNK_MAGIC);
        buf[4..6].copy_from_slice(&self.major.to_be_bytes());
        buf[6..8].copy_from_slice(&self.minor.to_be_bytes());
        buf[8..16].copy_from_slice(&self.chunk_size.to_be_bytes());
        buf[16..24].copy_from_slice(&self.start_nanos.to_be_bytes());
        buf[24..32].copy_from_slice(&self.duration_nanos.to_be_bytes());
        buf[32..40].copy_from_slice(&self.start_ticks.to_be_bytes());
        buf[40..48].copy_from_slice(&self.ticks_per_second.to_be_bytes());
        buf[48..52].copy_from_slice(&self.event_count.to_be_bytes());
        buf[52..56].copy_from_slice(&self.features.to_be_bytes());
        buf[56..60].copy_from_slice(&self.body_checksum.to_be_bytes());
        // bytes 60-67 reserved

        buf
    }

    /// Parse and validate a header from the start of `buf`
    pub fn from_bytes(buf: &[u8]) -> RecordingResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(RecordingError::malformed(format!(
                "Truncated chunk header: {} of {} bytes",
                buf.len(),
                HEADER_SIZE
            )));
        }

        if buf[0..4] != CHUNK_MAGIC {
            return Err(RecordingError::malformed(format!(
                "Invalid magic: {:?}",
                &buf[0..4]
            )));
        }

        let header = Self {
            major: u16::from_be_bytes([buf[4], buf[5]]),
            minor: u16::from_be_bytes([buf[6], buf[7]]),
            chunk_size: u64::from_be_bytes(array8(&buf[8..16])),
            start_nanos: i64::from_be_bytes(array8(&buf[16..24])),
            duration_nanos: i64::from_be_bytes(array8(&buf[24..32])),
            start_ticks: i64::from_be_bytes(array8(&buf[32..40])),
            ticks_per_second: i64::from_be_bytes(array8(&buf[40..48])),
            event_count: u32::from_be_bytes([buf[48], buf[49], buf[50], buf[51]]),
            features: u32::from_be_bytes([buf[52], buf[53], buf[54], buf[55]]),
            body_checksum: u32::from_be_bytes([buf[56], buf[57], buf[58], buf[59]]),
        };

        if header.major != MAJOR_VERSION {
            return Err(RecordingError::malformed(format!(
                "Unsupported version: {}.{}",
                header.major, header.minor
            )));
        }
        if header.chunk_size < HEADER_SIZE as u64 {
            return Err(RecordingError::malformed(format!(
                "Chunk size {} smaller than header",
                header.chunk_size
            )));
        }
        if header.duration_nanos < 0 {
            return Err(RecordingError::malformed(format!(
                "Negative chunk duration: {}",
                header.duration_nanos
            )));
        }
        if header.ticks_per_second <= 0 {
            return Err(RecordingError::malformed(format!(
                "Invalid ticks per second: {}",
                header.ticks_per_second
            )));
        }

        Ok(header)
    }

    /// Convert an absolute tick value to epoch nanoseconds
    pub fn ticks_to_nanos(&self, ticks: i64) -> i64 {
        let elapsed = self.ticks_to_duration(ticks as i128 - self.start_ticks as i128);
        self.start_nanos.saturating_add(elapsed)
    }

    /// Convert a tick count to nanoseconds
    pub fn ticks_to_duration(&self, ticks: impl Into<i128>) -> i64 {
        let nanos = ticks.into() * 1_000_000_000 / self.ticks_per_second as i128;
        nanos.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Convert nanoseconds to a tick count (inverse of `ticks_to_duration`)
    pub fn duration_to_ticks(&self, nanos: i64) -> i64 {
        let ticks = nanos as i128 * self.ticks_per_second as i128 / 1_000_000_000;
        ticks.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

fn array8(slice: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(slice);
    out
}

/// Cursor over a decoded chunk body
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `len` bytes
    pub fn take(&mut self, len: usize) -> RecordingResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(RecordingError::malformed(format!(
                "Unexpected end of data at offset {}: wanted {} bytes, {} left",
                self.pos,
                len,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> RecordingResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_varint(&mut self) -> RecordingResult<u64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(RecordingError::malformed(format!(
            "Varint overflow at offset {}",
            self.pos
        )))
    }

    pub fn read_signed(&mut self) -> RecordingResult<i64> {
        let raw = self.read_varint()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Read a varint that must fit in `usize`
    pub fn read_len(&mut self) -> RecordingResult<usize> {
        let raw = self.read_varint()?;
        usize::try_from(raw)
            .map_err(|_| RecordingError::malformed(format!("Length out of range: {}", raw)))
    }

    pub fn read_f64(&mut self) -> RecordingResult<f64> {
        Ok(f64::from_be_bytes(array8(self.take(8)?)))
    }

    /// Read an encoded string; `None` for the null encoding
    pub fn read_string(&mut self) -> RecordingResult<Option<String>> {
        match self.read_u8()? {
            STRING_NULL => Ok(None),
            STRING_EMPTY => Ok(Some(String::new())),
            STRING_UTF8 => {
                let len = self.read_len()?;
                let bytes = self.take(len)?;
                let text = std::str::from_utf8(bytes).map_err(|e| {
                    RecordingError::malformed(format!("Invalid UTF-8 string: {}", e))
                })?;
                Ok(Some(text.to_string()))
            }
            other => Err(RecordingError::malformed(format!(
                "Unknown string encoding: {}",
                other
            ))),
        }
    }

    /// Read a string that may not be null (type and field names)
    pub fn read_name(&mut self) -> RecordingResult<String> {
        self.read_string()?
            .ok_or_else(|| RecordingError::malformed("Null name in metadata"))
    }
}

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn write_signed(out: &mut Vec<u8>, value: i64) {
    write_varint(out, ((value << 1) ^ (value >> 63)) as u64);
}

pub fn write_string(out: &mut Vec<u8>, value: Option<&str>) {
    match value {
        None => out.push(STRING_NULL),
        Some("") => out.push(STRING_EMPTY),
        Some(s) => {
            out.push(STRING_UTF8);
            write_varint(out, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
    }
}
