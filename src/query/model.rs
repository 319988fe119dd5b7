//! Resolved query and search models
//!
//! These are what the executors run. The JSON wire forms in
//! [`request`](super::request) are converted into them.
//!
//! ```rust,ignore
//! let query = Query::targets(&["jdk.CPULoad.user", "recording_duration"])
//!     .range(150, 300)
//!     .build();
//!
//! let table = Query::targets(&["jdk.ExecutionSample"]).table().build();
//! ```

use crate::recording::TimeRange;
use serde::Deserialize;

/// Requested output shape of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Shape {
    #[default]
    #[serde(rename = "timeseries", alias = "timeserie")]
    Timeseries,
    #[serde(rename = "table")]
    Table,
}

/// One requested target with its resolved shape
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTarget {
    pub name: String,
    pub shape: Shape,
}

/// A resolved query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Targets in request order
    pub targets: Vec<QueryTarget>,
    /// Inclusive millisecond range; `from > to` matches nothing
    pub range: TimeRange,
    /// Upper bound on points per series
    pub max_data_points: Option<usize>,
}

impl Query {
    /// Start building a query for some targets
    pub fn targets(names: &[&str]) -> QueryBuilder {
        QueryBuilder::new(names)
    }
}

/// Builder for [`Query`]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    targets: Vec<(String, Option<Shape>)>,
    shape: Shape,
    range: TimeRange,
    max_data_points: Option<usize>,
}

impl QueryBuilder {
    pub fn new(names: &[&str]) -> Self {
        Self {
            targets: names.iter().map(|n| (n.to_string(), None)).collect(),
            shape: Shape::default(),
            range: TimeRange::unbounded(),
            max_data_points: None,
        }
    }

    /// Add a target with an explicit shape
    pub fn target(mut self, name: impl Into<String>, shape: Option<Shape>) -> Self {
        self.targets.push((name.into(), shape));
        self
    }

    /// Default shape for targets without their own
    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn table(self) -> Self {
        self.shape(Shape::Table)
    }

    /// Inclusive range in epoch milliseconds
    pub fn range(mut self, from: i64, to: i64) -> Self {
        self.range = TimeRange::new(from, to);
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    /// Limit points per series; zero means no limit
    pub fn max_data_points(mut self, max: usize) -> Self {
        self.max_data_points = (max > 0).then_some(max);
        self
    }

    pub fn build(self) -> Query {
        let shape = self.shape;
        Query {
            targets: self
                .targets
                .into_iter()
                .map(|(name, own)| QueryTarget {
                    name,
                    shape: own.unwrap_or(shape),
                })
                .collect(),
            range: self.range,
            max_data_points: self.max_data_points,
        }
    }
}

/// What a search asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Search {
    /// Target name completion
    Targets { filter: Option<String> },
    /// Event type names
    Events { filter: Option<String> },
    /// Series-capable fields of one event type
    Fields { event_type: String },
}

impl Search {
    /// Target completion; `"*"` or empty text means everything
    pub fn targets(text: Option<&str>) -> Self {
        Search::Targets {
            filter: normalize_filter(text),
        }
    }

    pub fn events(text: Option<&str>) -> Self {
        Search::Events {
            filter: normalize_filter(text),
        }
    }

    pub fn fields(event_type: impl Into<String>) -> Self {
        Search::Fields {
            event_type: event_type.into(),
        }
    }
}

fn normalize_filter(text: Option<&str>) -> Option<String> {
    match text {
        None | Some("") | Some("*") => None,
        Some(text) => Some(text.to_string()),
    }
}
