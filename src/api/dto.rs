//! Data Transfer Objects
//!
//! Types specific to the HTTP surface. Search and query bodies live in
//! [`crate::query`] since the CLI speaks the same JSON.

use serde::{Deserialize, Serialize};

use crate::index::IndexStats;

/// Query string of /upload and /load
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    /// Replace a stored recording with the same name
    #[serde(default)]
    pub overwrite: bool,
}

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy", "degraded" or "unhealthy"
    pub status: String,
    /// Upload directory status: "ok" or "error"
    pub storage: String,
    /// Current index status: "ok", "none" or "error"
    pub index: String,
    /// Name of the selected recording
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<String>,
    /// Statistics of the published index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
    /// Why the current recording could not be indexed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Crate version
    pub version: String,
}
