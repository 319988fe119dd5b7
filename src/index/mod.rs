//! Recording Index
//!
//! Turns the parsed events of one recording into a structure the search
//! and query executors can read concurrently:
//!
//! - **EventTypeSchema**: observed fields per event type, first-seen order
//! - **RecordingIndex**: per-type events and per-target numeric series
//! - **IndexManager**: publishes one immutable snapshot per recording
//!   generation, swapping it in only once fully built

mod error;
mod manager;
mod recording_index;
mod schema;

pub use error::{IndexError, IndexResult};
pub use manager::{FailedBuild, IndexManager, IndexSnapshot};
pub use recording_index::{IndexStats, RecordingIndex, SeriesPoint};
pub use schema::{EventTypeSchema, FieldSchema};
