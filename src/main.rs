//! JFR Datasource Server
//!
//! Run with: cargo run --bin jfr-datasource -- [--config path]
//!
//! # Configuration
//!
//! Read from a TOML file (see `jfr-datasource-cli config`), overridden by:
//! - `JFR_DATASOURCE_RECORDINGS_DIR`: Upload directory
//! - `JFR_DATASOURCE_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `JFR_DATASOURCE_API_PORT`: Port to listen on (default: 8080)
//! - `JFR_DATASOURCE_LOG_LEVEL`: Log level (default: info)
//! - `JFR_DATASOURCE_LOG_FORMAT`: `pretty` or `json`
//! - `RUST_LOG`: Full filter directive, wins over the log level

use anyhow::Context;
use clap::Parser;
use jfr_datasource::api::{serve, ApiConfig, AppState};
use jfr_datasource::config::{Config, LoggingConfig};
use jfr_datasource::index::IndexManager;
use jfr_datasource::session::RecordingStore;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "jfr-datasource")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dashboard datasource for flight-recorder recordings")]
struct Args {
    /// Config file (default: standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::resolve(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.api.port = port;
    }

    init_logging(&config.logging)?;

    tracing::info!("Starting JFR datasource v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(
        RecordingStore::open(config.recordings.dir_path())
            .await
            .context("Failed to open recording directory")?,
    );
    tracing::info!("Recording directory: {:?}", store.dir());

    let indexes = Arc::new(IndexManager::new(store.clone()));
    let watcher = if config.recordings.watch_changes {
        tracing::info!("Rebuilding index on recording changes");
        Some(indexes.spawn_watcher())
    } else {
        None
    };

    let api_config = ApiConfig::from(&config.api);
    let state = AppState::with_indexes(store, indexes, api_config.clone());

    serve(state, &api_config).await?;

    if let Some(watcher) = watcher {
        watcher.abort();
    }
    tracing::info!("JFR datasource stopped");

    Ok(())
}

/// Install the global subscriber from the `[logging]` section
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "jfr_datasource={level},jfr_datasource_cli={level},tower_http={level}",
                level = config.level
            ))
        })
        .with_context(|| format!("Invalid log level {:?}", config.level))?;

    let file = config
        .file
        .as_ref()
        .map(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))
        })
        .transpose()?;

    let registry = tracing_subscriber::registry().with(filter);
    match (config.is_json(), file) {
        (true, Some(file)) => registry
            .with(fmt::layer().json().with_writer(Mutex::new(file)))
            .init(),
        (true, None) => registry.with(fmt::layer().json()).init(),
        (false, Some(file)) => registry
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        (false, None) => registry.with(fmt::layer()).init(),
    }

    Ok(())
}
