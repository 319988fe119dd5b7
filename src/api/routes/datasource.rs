//! Datasource Routes
//!
//! The dashboard datasource protocol.
//!
//! - GET / - Connectivity probe
//! - POST /search - Event type, field and target discovery
//! - POST /query - Time series and tables
//! - POST /annotations - Always empty

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde_json::Value;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::query::{QueryRequest, QueryResponseItem, SearchRequest, SearchResponse};

/// GET /
///
/// Dashboards test the datasource with a plain GET.
pub async fn probe() -> StatusCode {
    StatusCode::OK
}

/// POST /search
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(req) = payload?;
    let search = req.into_search()?;

    let response = state.search.execute(&search).await?;
    Ok(Json(response))
}

/// POST /query
///
/// One response element per requested target, in request order.
pub async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<QueryResponseItem>>> {
    let Json(req) = payload?;
    let query = req.into_query()?;

    let items = state.query.execute(&query).await?;
    Ok(Json(items))
}

/// POST /annotations
pub async fn annotations() -> Json<Vec<Value>> {
    Json(Vec::new())
}
