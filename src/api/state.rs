//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::index::IndexManager;
use crate::query::{QueryExecutor, SearchExecutor};
use crate::session::RecordingStore;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Uploaded recordings and the current selection
    pub store: Arc<RecordingStore>,
    /// Index of the current recording
    pub indexes: Arc<IndexManager>,
    /// Executor for /query
    pub query: Arc<QueryExecutor>,
    /// Executor for /search
    pub search: Arc<SearchExecutor>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire the index manager and executors around a store
    pub fn new(store: Arc<RecordingStore>, config: ApiConfig) -> Self {
        let indexes = Arc::new(IndexManager::new(store.clone()));
        Self::with_indexes(store, indexes, config)
    }

    /// Use an existing index manager (shared with a background watcher)
    pub fn with_indexes(
        store: Arc<RecordingStore>,
        indexes: Arc<IndexManager>,
        config: ApiConfig,
    ) -> Self {
        Self {
            query: Arc::new(QueryExecutor::new(Arc::clone(&indexes))),
            search: Arc::new(SearchExecutor::new(Arc::clone(&indexes))),
            store,
            indexes,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum request body size in bytes (bounds uploads)
    pub max_upload_bytes: usize,
    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            max_upload_bytes: 512 * 1024 * 1024, // 512MB
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
