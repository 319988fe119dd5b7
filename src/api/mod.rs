//! Datasource HTTP API
//!
//! HTTP layer for the datasource, built with Axum.
//!
//! # Endpoints
//!
//! ## Datasource protocol
//! - `GET /` - Connectivity probe
//! - `POST /search` - Discover event types, fields and targets
//! - `POST /query` - Time series and tables
//! - `POST /annotations` - Always `[]`
//!
//! ## Recordings
//! - `POST /upload` - Store uploaded recordings
//! - `POST /load` - Store and select
//! - `POST /set` - Select a stored recording
//! - `GET /list` - List stored recordings
//! - `GET /current` - Current recording name
//! - `DELETE /delete` - Delete one recording
//! - `DELETE /delete_all` - Delete every recording
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use jfr_datasource::api::{serve, ApiConfig, AppState};
//! use jfr_datasource::session::RecordingStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(RecordingStore::open(RecordingStore::default_dir()).await?);
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(store, config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let datasource_routes = Router::new()
        .route("/", get(routes::datasource::probe))
        .route("/search", post(routes::datasource::search))
        .route("/query", post(routes::datasource::query))
        .route("/annotations", post(routes::datasource::annotations));

    let recording_routes = Router::new()
        .route("/upload", post(routes::recordings::upload))
        .route("/load", post(routes::recordings::load))
        .route("/set", post(routes::recordings::set))
        .route("/list", get(routes::recordings::list))
        .route("/current", get(routes::recordings::current))
        .route("/delete", delete(routes::recordings::delete))
        .route("/delete_all", delete(routes::recordings::delete_all));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .merge(datasource_routes)
        .merge(recording_routes)
        .nest("/health", health_routes)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(shared_state)
}

/// Permissive CORS unless specific origins are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Datasource API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Datasource API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Event, RecordingWriter};
    use crate::session::RecordingStore;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "recording-upload-boundary";

    async fn create_test_app() -> (Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordingStore::open(dir.path()).await.unwrap());

        let state = AppState::new(store, ApiConfig::default());
        let router = build_router(state);

        (router, dir)
    }

    fn cpu_recording() -> Vec<u8> {
        let events = vec![
            Event::at_millis("jdk.CPULoad", 1_000).field("user", 0.25),
            Event::at_millis("jdk.CPULoad", 2_000).field("user", 0.5),
            Event::at_millis("jdk.ThreadStart", 1_500).field("thread", "main"),
        ];
        RecordingWriter::from_events(1_000_000_000, &events)
            .unwrap()
            .finish()
    }

    fn multipart_request(uri: &str, files: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn text_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _dir) = create_test_app().await;

        let response = app.oneshot(get("/health/live")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let (app, _dir) = create_test_app().await;

        let response = app.oneshot(get("/health/ready")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _dir) = create_test_app().await;

        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health = body_json(response).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["index"], "none");
    }

    #[tokio::test]
    async fn test_probe() {
        let (app, _dir) = create_test_app().await;

        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "");

        let response = app.oneshot(text_request("POST", "/", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_wrong_methods() {
        let (app, _dir) = create_test_app().await;

        for (method, uri) in [
            ("GET", "/search"),
            ("GET", "/query"),
            ("GET", "/annotations"),
            ("GET", "/set"),
            ("GET", "/upload"),
            ("POST", "/list"),
            ("POST", "/current"),
            ("POST", "/delete_all"),
            ("POST", "/delete"),
        ] {
            let response = app
                .clone()
                .oneshot(text_request(method, uri, ""))
                .await
                .unwrap();
            assert_eq!(
                response.status(),
                StatusCode::METHOD_NOT_ALLOWED,
                "{} {}",
                method,
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_upload_renames_duplicates() {
        let (app, _dir) = create_test_app().await;
        let recording = cpu_recording();

        let response = app
            .clone()
            .oneshot(multipart_request("/upload", &[("profile.jfr", &recording[..])]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Uploaded: profile.jfr\n");

        let response = app
            .clone()
            .oneshot(multipart_request("/upload", &[("profile.jfr", &recording[..])]))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "Uploaded: profile_1.jfr\n");

        let response = app
            .clone()
            .oneshot(multipart_request(
                "/upload?overwrite=true",
                &[("profile.jfr", &recording[..])],
            ))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "Uploaded: profile.jfr\n");

        let response = app.oneshot(get("/list")).await.unwrap();
        assert_eq!(body_text(response).await, "profile.jfr\nprofile_1.jfr\n");
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_names() {
        let (app, _dir) = create_test_app().await;

        let response = app
            .oneshot(multipart_request("/upload", &[("..", &b"data"[..])]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_load_then_query() {
        let (app, _dir) = create_test_app().await;
        let recording = cpu_recording();

        let response = app
            .clone()
            .oneshot(multipart_request("/load", &[("cpu.jfr", &recording[..])]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Uploaded: cpu.jfr\nSet: cpu.jfr\n");

        let response = app
            .clone()
            .oneshot(json_request(
                "/query",
                json!({
                    "range": {"from": "1970-01-01T00:00:00Z", "to": "1970-01-01T00:00:05Z"},
                    "targets": [
                        {"target": "jdk.CPULoad.user", "refId": "A", "type": "timeserie"},
                        {"target": "recording_start_time", "refId": "B"}
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([
                {"target": "jdk.CPULoad.user", "datapoints": [[0.25, 1000], [0.5, 2000]]},
                {"target": "recording_start_time", "datapoints": [[1000, 1000]]}
            ])
        );

        let response = app.oneshot(get("/current")).await.unwrap();
        assert_eq!(body_text(response).await, "cpu.jfr\n");
    }

    #[tokio::test]
    async fn test_search_after_load() {
        let (app, _dir) = create_test_app().await;
        let recording = cpu_recording();

        app.clone()
            .oneshot(multipart_request("/load", &[("cpu.jfr", &recording[..])]))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request("/search", json!({"type": "events"})))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!(["jdk.CPULoad", "jdk.ThreadStart"])
        );

        let response = app
            .clone()
            .oneshot(json_request("/search", json!({"target": "CPU"})))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!([{"text": "jdk.CPULoad.user", "value": "jdk.CPULoad.user"}])
        );

        let response = app
            .oneshot(json_request(
                "/search",
                json!({"type": "fields", "eventType": "jdk.CPULoad"}),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!(["user"]));
    }

    #[tokio::test]
    async fn test_no_recording_is_empty() {
        let (app, _dir) = create_test_app().await;

        let response = app
            .clone()
            .oneshot(json_request("/search", json!({"target": "*"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));

        let response = app
            .clone()
            .oneshot(json_request("/query", json!({"targets": ["jdk.CPULoad.user"]})))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!([{"target": "jdk.CPULoad.user", "datapoints": []}])
        );

        let response = app.oneshot(get("/current")).await.unwrap();
        assert_eq!(body_text(response).await, "\n");
    }

    #[tokio::test]
    async fn test_malformed_recording_is_unprocessable() {
        let (app, _dir) = create_test_app().await;

        app.clone()
            .oneshot(multipart_request("/load", &[("broken.jfr", &b"not a recording"[..])]))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request("/query", json!({"targets": ["recording_duration"]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "MALFORMED_RECORDING");

        let response = app.oneshot(get("/health")).await.unwrap();
        let health = body_json(response).await;
        assert_eq!(health["index"], "error");
        assert_eq!(health["status"], "degraded");
    }

    #[tokio::test]
    async fn test_health_recovers_after_malformed_recording_deleted() {
        let (app, _dir) = create_test_app().await;

        app.clone()
            .oneshot(multipart_request("/load", &[("broken.jfr", &b"not a recording"[..])]))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(json_request("/query", json!({"targets": ["recording_duration"]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .clone()
            .oneshot(text_request("DELETE", "/delete", "broken.jfr"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        let health = body_json(response).await;
        assert_eq!(health["index"], "none");
        assert_eq!(health["status"], "healthy");
        assert!(health.get("last_error").map_or(true, Value::is_null));

        let response = app
            .oneshot(json_request("/query", json!({"targets": ["recording_duration"]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (app, _dir) = create_test_app().await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "/query",
                json!({"targets": [{"target": "x.y", "type": "heatmap"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request("/search", json!({"type": "fields"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_annotations_empty() {
        let (app, _dir) = create_test_app().await;

        let response = app
            .oneshot(json_request("/annotations", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_set_list_delete() {
        let (app, _dir) = create_test_app().await;
        let recording = cpu_recording();

        app.clone()
            .oneshot(multipart_request(
                "/upload",
                &[("a.jfr", &recording[..]), ("b.jfr", &recording[..])],
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(text_request("POST", "/set", "missing.jfr"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(text_request("POST", "/set", "b.jfr"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Set: b.jfr\n");

        let response = app.clone().oneshot(get("/list")).await.unwrap();
        assert_eq!(body_text(response).await, "a.jfr\n**b.jfr**\n");

        let response = app
            .clone()
            .oneshot(text_request("DELETE", "/delete", "b.jfr"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(text_request("DELETE", "/delete", "b.jfr"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.clone().oneshot(get("/current")).await.unwrap();
        assert_eq!(body_text(response).await, "\n");

        let response = app
            .clone()
            .oneshot(text_request("DELETE", "/delete_all", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Deleted: a.jfr\n");

        let response = app.oneshot(get("/list")).await.unwrap();
        assert_eq!(body_text(response).await, "");
    }
}
