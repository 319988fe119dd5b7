//! # JFR Datasource
//!
//! Dashboard datasource for flight-recorder recordings: upload a
//! recording, select it, then chart its numeric fields and tabulate its
//! events through the simple-JSON datasource protocol.
//!
//! ## Features
//!
//! - **Recording parser**: chunked binary container with optional LZ4
//!   bodies and CRC32 checksums, decoded lazily chunk by chunk
//! - **Index**: per-type schemas and per-field time series, rebuilt in
//!   the background and published by swapping an `Arc`
//! - **Search and query**: target completion, event and field discovery,
//!   time series, tables and computed recording metrics
//! - **HTTP API**: Axum router for the datasource protocol and recording
//!   management
//!
//! ## Modules
//!
//! - [`recording`]: Container format, reader and writer
//! - [`index`]: Recording index and snapshot manager
//! - [`query`]: Search and query executors
//! - [`session`]: Upload directory and current selection
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jfr_datasource::index::RecordingIndex;
//! use jfr_datasource::query::{execute_query, Query};
//! use jfr_datasource::recording::Recording;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recording = Recording::open("profile.jfr")?;
//!     let index = RecordingIndex::from_recording(&recording)?;
//!
//!     let query = Query::targets(&["jdk.CPULoad.machineTotal"]).build();
//!     let result = execute_query(Some(&index), &query);
//!
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod index;
pub mod query;
pub mod recording;
pub mod session;

// Re-export top-level types for convenience
pub use recording::{
    Event, FieldValue, Recording, RecordingError, RecordingMetadata, RecordingResult,
    RecordingWriter, TimeRange,
};

pub use index::{IndexManager, IndexSnapshot, IndexStats, RecordingIndex};

pub use query::{
    Query, QueryError, QueryExecutor, QueryRequest, QueryResponseItem, Search, SearchExecutor,
    SearchRequest, SearchResponse,
};

pub use session::{RecordingSource, RecordingStore, SessionError, SessionResult};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
