//! Search and Query Executors
//!
//! Answer dashboard requests from the current recording index:
//!
//! - **Search**: discover event types, fields and target names
//! - **Query**: time series, tables and computed recording metrics
//!
//! # Targets
//!
//! ```text
//! jdk.CPULoad.user        series of the `user` field of jdk.CPULoad events
//! jdk.ExecutionSample     table of jdk.ExecutionSample events (table shape)
//! recording_duration      [duration_ms, start_ms]
//! recording_start_time    [start_ms, start_ms]
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use jfr_datasource::query::{Query, QueryExecutor};
//!
//! let query = Query::targets(&["jdk.CPULoad.user"]).range(150, 300).build();
//! let result = executor.execute(&query).await?;
//! ```

mod error;
mod executor;
mod model;
mod request;
mod response;
mod search;
mod target;

pub use error::{QueryError, QueryResult};
pub use executor::{execute_query, QueryExecutor};
pub use model::{Query, QueryBuilder, QueryTarget, Search, Shape};
pub use request::{parse_timestamp, QueryRequest, SearchKind, SearchRequest, TargetRequest, TimeBound};
pub use response::{
    Column, Datapoint, QueryResponseItem, SearchResponse, Table, TargetOption, TimeSeries,
};
pub use search::{execute_search, search_events, search_fields, search_targets, SearchExecutor};
pub use target::{ComputedMetric, Target, COMPUTED_METRICS};
