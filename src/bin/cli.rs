//! JFR Datasource CLI
//!
//! Offline tools for recording files:
//! - Summarize a recording
//! - Run searches and queries without a server
//! - Generate a demo recording
//! - Print the default config

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use jfr_datasource::config::generate_default_config;
use jfr_datasource::index::RecordingIndex;
use jfr_datasource::query::{execute_query, execute_search, parse_timestamp, Query, Search};
use jfr_datasource::recording::{Event, FieldKind, FieldValue, Recording, RecordingWriter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "jfr-datasource-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect flight-recorder recordings offline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format for summary
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchKindArg {
    Target,
    Events,
    Fields,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show start time, duration and event types of a recording
    Summary {
        /// Recording file
        file: PathBuf,
    },

    /// List targets, event types or fields
    Search {
        /// Recording file
        file: PathBuf,
        /// What to search for
        #[arg(short, long, value_enum, default_value_t = SearchKindArg::Target)]
        kind: SearchKindArg,
        /// Event type (required for fields)
        #[arg(short, long)]
        event_type: Option<String>,
        /// Substring filter
        text: Option<String>,
    },

    /// Query targets and print the JSON response
    Query {
        /// Recording file
        file: PathBuf,
        /// Targets (e.g. jdk.CPULoad.machineTotal)
        #[arg(required = true)]
        targets: Vec<String>,
        /// Range start: epoch millis, ISO 8601 or now-<n><unit>
        #[arg(long)]
        from: Option<String>,
        /// Range end
        #[arg(long)]
        to: Option<String>,
        /// Resolve targets as tables
        #[arg(long)]
        table: bool,
        /// Keep at most this many points per series
        #[arg(long)]
        max_points: Option<usize>,
    },

    /// Write a synthetic recording
    Demo {
        /// Output file
        out: PathBuf,
        /// Length of the recording in minutes
        #[arg(short, long, default_value = "5")]
        minutes: u32,
        /// Store chunks LZ4 compressed
        #[arg(long)]
        compress: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Summary {
    file: String,
    size_bytes: usize,
    chunks: usize,
    start: String,
    duration_millis: i64,
    event_count: usize,
    event_types: Vec<EventTypeSummary>,
}

#[derive(Serialize)]
struct EventTypeSummary {
    name: String,
    events: usize,
    fields: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary { file } => {
            let (recording, index) = load(&file)?;
            let summary = summarize(&file, &recording, &index);

            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
                OutputFormat::Text => print_summary(&summary),
            }
        }

        Commands::Search {
            file,
            kind,
            event_type,
            text,
        } => {
            let search = match kind {
                SearchKindArg::Target => Search::targets(text.as_deref()),
                SearchKindArg::Events => Search::events(text.as_deref()),
                SearchKindArg::Fields => Search::fields(
                    event_type.context("--event-type is required for a fields search")?,
                ),
            };

            let (_, index) = load(&file)?;
            let response = execute_search(Some(&index), &search);
            for name in response.names() {
                println!("{}", name);
            }
        }

        Commands::Query {
            file,
            targets,
            from,
            to,
            table,
            max_points,
        } => {
            let now = Utc::now().timestamp_millis();
            let from = from
                .map(|s| parse_timestamp(&s, now))
                .transpose()?
                .unwrap_or(i64::MIN);
            let to = to
                .map(|s| parse_timestamp(&s, now))
                .transpose()?
                .unwrap_or(i64::MAX);

            let names: Vec<&str> = targets.iter().map(String::as_str).collect();
            let mut builder = Query::targets(&names).range(from, to);
            if table {
                builder = builder.table();
            }
            if let Some(max) = max_points {
                builder = builder.max_data_points(max);
            }

            let (_, index) = load(&file)?;
            let result = execute_query(Some(&index), &builder.build());
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Demo {
            out,
            minutes,
            compress,
        } => {
            let start = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            let writer = demo_recording(start, minutes, compress)?;
            let chunks = minutes.max(1);
            writer
                .write_to(&out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!(
                "Wrote {} ({} minutes, {} chunks)",
                out.display(),
                minutes,
                chunks
            );
        }

        Commands::Config { output } => {
            let config = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, &config)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

/// Parse a recording and build its index
fn load(path: &Path) -> anyhow::Result<(Recording, RecordingIndex)> {
    let started = Instant::now();
    let recording =
        Recording::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let index = RecordingIndex::from_recording(&recording)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!(
        file = %path.display(),
        events = index.event_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Recording loaded"
    );
    Ok((recording, index))
}

fn summarize(path: &Path, recording: &Recording, index: &RecordingIndex) -> Summary {
    let metadata = index.metadata();
    let start = DateTime::from_timestamp_millis(metadata.start_millis())
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| metadata.start_millis().to_string());

    Summary {
        file: path.display().to_string(),
        size_bytes: recording.size_bytes(),
        chunks: recording.chunk_count(),
        start,
        duration_millis: metadata.duration_millis(),
        event_count: index.event_count(),
        event_types: index
            .schemas()
            .map(|schema| EventTypeSummary {
                name: schema.name.to_string(),
                events: schema.event_count,
                fields: schema.fields.len(),
            })
            .collect(),
    }
}

fn print_summary(summary: &Summary) {
    println!("File:       {}", summary.file);
    println!("Size:       {} bytes", summary.size_bytes);
    println!("Chunks:     {}", summary.chunks);
    println!("Start:      {}", summary.start);
    println!("Duration:   {:.3} s", summary.duration_millis as f64 / 1000.0);
    println!("Events:     {}", summary.event_count);
    println!();

    let width = summary
        .event_types
        .iter()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0)
        .max("Event type".len());
    println!("{:<width$}  {:>10}  {:>6}", "Event type", "Events", "Fields");
    println!("{}", "-".repeat(width + 20));
    for event_type in &summary.event_types {
        println!(
            "{:<width$}  {:>10}  {:>6}",
            event_type.name, event_type.events, event_type.fields
        );
    }
}

const SECOND_NANOS: i64 = 1_000_000_000;

/// CPU load every second, execution samples every 200 ms, a GC pause every
/// 10 s; one chunk per minute
fn demo_recording(start: i64, minutes: u32, compress: bool) -> anyhow::Result<RecordingWriter> {
    let mut writer = RecordingWriter::new(start)
        .compression(compress)
        .duration(i64::from(minutes.max(1)) * 60 * SECOND_NANOS);

    writer.declare_type(
        "jdk.CPULoad",
        &[
            ("jvmUser", FieldKind::Double),
            ("jvmSystem", FieldKind::Double),
            ("machineTotal", FieldKind::Double),
        ],
    )?;
    writer.declare_type(
        "jdk.ExecutionSample",
        &[("stackTrace", FieldKind::String), ("state", FieldKind::String)],
    )?;
    writer.declare_type(
        "jdk.GCPhasePause",
        &[
            ("gcId", FieldKind::Long),
            ("name", FieldKind::String),
            ("duration", FieldKind::Duration),
        ],
    )?;

    const FRAMES: [&str; 4] = [
        "java.lang.Thread.run()",
        "java.util.HashMap.resize()",
        "com.example.Server.handle(Request)",
        "java.io.FileInputStream.readBytes(byte[], int, int)",
    ];

    let samples_per_minute = 60 * 5;
    for minute in 0..i64::from(minutes.max(1)) {
        if minute > 0 {
            writer.new_chunk();
        }

        for tick in 0..samples_per_minute {
            let step = minute * samples_per_minute + tick;
            let at = start + step * SECOND_NANOS / 5;

            let frame = FRAMES[(step as usize * 7) % FRAMES.len()];
            let state = if step % 3 == 0 {
                "STATE_SLEEPING"
            } else {
                "STATE_RUNNABLE"
            };
            writer.write_event(
                &Event::new("jdk.ExecutionSample", at)
                    .field("stackTrace", frame)
                    .field("state", state),
            )?;

            if tick % 5 == 0 {
                let phase = step as f64 / 50.0;
                let user = 0.25 + 0.2 * phase.sin();
                let system = 0.05 + 0.03 * (phase * 0.7).cos().abs();
                writer.write_event(
                    &Event::new("jdk.CPULoad", at)
                        .field("jvmUser", user)
                        .field("jvmSystem", system)
                        .field("machineTotal", (user + system + 0.1).min(1.0)),
                )?;
            }

            if tick % 50 == 25 {
                let gc_id = step / 50;
                writer.write_event(
                    &Event::new("jdk.GCPhasePause", at)
                        .field("gcId", gc_id)
                        .field("name", "GC Pause")
                        .field(
                            "duration",
                            FieldValue::Duration(2_000_000 + (gc_id % 7) * 750_000),
                        ),
                )?;
            }
        }
    }

    Ok(writer)
}
