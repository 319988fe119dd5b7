//! Recording Routes
//!
//! Upload and manage the recordings the datasource serves. Responses are
//! plain text, one line per affected file.
//!
//! - POST /upload - Store multipart files (`?overwrite=true` replaces)
//! - POST /load - Upload, then select the last file
//! - POST /set - Select a stored recording (body: file name)
//! - GET /list - Stored recordings, current one as `**name**`
//! - GET /current - Name of the current recording
//! - DELETE /delete - Delete one recording (body: file name)
//! - DELETE /delete_all - Delete every recording

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
};
use std::fmt::Write;
use std::sync::Arc;

use crate::api::dto::UploadParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// Save every file part of the request, returning the stored names
async fn save_uploads(
    state: &AppState,
    overwrite: bool,
    mut multipart: Multipart,
) -> ApiResult<Vec<String>> {
    let mut saved = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        // Plain form fields carry no file
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        saved.push(state.store.save(&file_name, &bytes, overwrite).await?);
    }

    if saved.is_empty() {
        return Err(ApiError::Validation("No file uploaded".to_string()));
    }
    Ok(saved)
}

fn uploaded_lines(names: &[String]) -> String {
    names.iter().fold(String::new(), |mut out, name| {
        let _ = writeln!(out, "Uploaded: {}", name);
        out
    })
}

/// POST /upload
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> ApiResult<String> {
    let saved = save_uploads(&state, params.overwrite, multipart).await?;
    Ok(uploaded_lines(&saved))
}

/// POST /load
pub async fn load(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> ApiResult<String> {
    let saved = save_uploads(&state, params.overwrite, multipart).await?;
    let mut body = uploaded_lines(&saved);

    if let Some(last) = saved.last() {
        state.store.select(last).await?;
        let _ = writeln!(body, "Set: {}", last);
    }
    Ok(body)
}

/// POST /set
pub async fn set(State(state): State<Arc<AppState>>, body: String) -> ApiResult<String> {
    let name = body.trim();
    state.store.select(name).await?;
    Ok(format!("Set: {}\n", name))
}

/// GET /list
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<String> {
    let entries = state.store.list().await?;

    Ok(entries.iter().fold(String::new(), |mut out, entry| {
        let _ = if entry.current {
            writeln!(out, "**{}**", entry.name)
        } else {
            writeln!(out, "{}", entry.name)
        };
        out
    }))
}

/// GET /current
pub async fn current(State(state): State<Arc<AppState>>) -> String {
    format!("{}\n", state.store.current().await.unwrap_or_default())
}

/// DELETE /delete
pub async fn delete(State(state): State<Arc<AppState>>, body: String) -> ApiResult<StatusCode> {
    state.store.delete(body.trim()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /delete_all
pub async fn delete_all(State(state): State<Arc<AppState>>) -> ApiResult<String> {
    let deleted = state.store.delete_all().await?;

    Ok(deleted.iter().fold(String::new(), |mut out, name| {
        let _ = writeln!(out, "Deleted: {}", name);
        out
    }))
}
