//! Search Executor
//!
//! Name discovery for dashboard editors. Results are sorted and
//! deduplicated, and filtered by exact, case-sensitive substring.

use crate::index::{IndexManager, RecordingIndex};
use crate::query::error::QueryResult;
use crate::query::model::Search;
use crate::query::response::{SearchResponse, TargetOption};
use crate::query::target::COMPUTED_METRICS;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Runs searches against the current index snapshot
pub struct SearchExecutor {
    indexes: Arc<IndexManager>,
}

impl SearchExecutor {
    pub fn new(indexes: Arc<IndexManager>) -> Self {
        Self { indexes }
    }

    pub async fn execute(&self, search: &Search) -> QueryResult<SearchResponse> {
        let snapshot = self.indexes.snapshot().await?;
        let response = execute_search(snapshot.as_deref().map(|s| &s.index), search);

        tracing::debug!(search = ?search, matches = response.names().len(), "Search executed");
        Ok(response)
    }
}

/// Execute a search against an index; no index means no matches
pub fn execute_search(index: Option<&RecordingIndex>, search: &Search) -> SearchResponse {
    match search {
        Search::Targets { filter } => SearchResponse::Targets(
            search_targets(index, filter.as_deref())
                .into_iter()
                .map(TargetOption::new)
                .collect(),
        ),
        Search::Events { filter } => SearchResponse::Names(search_events(index, filter.as_deref())),
        Search::Fields { event_type } => SearchResponse::Names(search_fields(index, event_type)),
    }
}

fn contains_filter(candidate: &str, filter: Option<&str>) -> bool {
    filter.map_or(true, |text| candidate.contains(text))
}

/// Every series target plus the reserved computed names
pub fn search_targets(index: Option<&RecordingIndex>, filter: Option<&str>) -> Vec<String> {
    let Some(index) = index else {
        return Vec::new();
    };

    let names: BTreeSet<&str> = index
        .targets()
        .chain(COMPUTED_METRICS.iter().map(|(name, _)| *name))
        .filter(|name| contains_filter(name, filter))
        .collect();
    names.into_iter().map(String::from).collect()
}

/// Event type names
pub fn search_events(index: Option<&RecordingIndex>, filter: Option<&str>) -> Vec<String> {
    index
        .map(|index| {
            index
                .event_types()
                .filter(|name| contains_filter(name, filter))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Series-capable field names of one event type
pub fn search_fields(index: Option<&RecordingIndex>, event_type: &str) -> Vec<String> {
    let Some(schema) = index.and_then(|index| index.schema(event_type)) else {
        return Vec::new();
    };

    let names: BTreeSet<&str> = schema.series_fields().map(|f| f.name.as_ref()).collect();
    names.into_iter().map(String::from).collect()
}
