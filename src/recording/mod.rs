//! Recording Parser
//!
//! Reads flight-recorder style recordings: a sequence of chunks, each with
//! a fixed header, type declarations and size-prefixed event records.
//!
//! Parsing is two-phase. [`Recording::from_bytes`] validates the container
//! and derives [`RecordingMetadata`] from chunk headers alone, while
//! [`Recording::events`] decodes events lazily one chunk at a time.

pub mod compression;
pub mod error;
pub mod format;
pub mod parser;
pub mod types;
pub mod writer;

pub use error::{RecordingError, RecordingResult};
pub use format::FieldKind;
pub use parser::{Events, Recording};
pub use types::{nanos_to_millis, Event, FieldValue, RecordingMetadata, TimeRange, ValueKind};
pub use writer::RecordingWriter;
