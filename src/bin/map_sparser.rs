//! Map Sparser Binary
//!
//! Runs the sparse map pipeline over a list of source maps, standing in for
//! the build tool that normally drives it:
//! - One run context (one maps index) shared by every file
//! - Files processed concurrently on the blocking pool
//! - Sparse maps written to their public paths, headers and `maps.json` beside them
//!
//! ## Configuration
//!
//! Environment variables:
//! - `SPARSER_CONFIG`: path to a JSON config file (flat or build-tool style)
//! - `SPARSER_*`: individual settings when no config file is given
//!   (see `tilemap_sparser::config`)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: pretty)
//!
//! ## Usage
//!
//! ```bash
//! SPARSER_PUBLIC_DIR=public cargo run --bin map_sparser --features cli -- app/assets/map/*.json
//! ```

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use tilemap_sparser::{
    write_best_effort, ArtifactKind, ArtifactOrigin, ConfigError, FsSink, MapPipeline,
    SourceFile, SparserConfig, WriteStatus,
};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "map_sparser=info,tilemap_sparser=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

fn load_config() -> Result<SparserConfig, ConfigError> {
    match std::env::var("SPARSER_CONFIG") {
        Ok(path) if !path.is_empty() => {
            info!(config = %path, "Loading config file");
            SparserConfig::from_file(path)
        }
        _ => SparserConfig::from_env(),
    }
}

/// What happened to one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Written,
    Cached,
    Skipped,
    Failed,
}

#[derive(Debug, Default)]
struct RunSummary {
    written: usize,
    cached: usize,
    skipped: usize,
    failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Written => self.written += 1,
            FileOutcome::Cached => self.cached += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed => self.failed += 1,
        }
    }
}

fn process_file(pipeline: &MapPipeline, sink: &FsSink, path: String) -> FileOutcome {
    let target = pipeline.paths(&path);
    if target.overwrites_source(&path) {
        warn!(path = %path, "Source is outside the watched assets, not processing it");
        return FileOutcome::Skipped;
    }

    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to read source map");
            return FileOutcome::Failed;
        }
    };

    let artifact = match pipeline.process(&SourceFile::new(path.as_str(), data)) {
        Ok(Some(artifact)) => artifact,
        Ok(None) => return FileOutcome::Skipped,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to process map");
            return FileOutcome::Failed;
        }
    };

    if artifact.origin == ArtifactOrigin::Cached {
        return FileOutcome::Cached;
    }

    match write_best_effort(sink, ArtifactKind::SparseMap, &target.sparsed, &artifact.data) {
        WriteStatus::Written => FileOutcome::Written,
        WriteStatus::Failed(_) => FileOutcome::Failed,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let config = load_config()?;
    let input = config.input_pattern()?;

    info!(
        version = version,
        mode = ?config.mode,
        watched_dir = %config.watched_dir,
        public_dir = %config.public_dir,
        "Starting map sparser"
    );

    let sink = Arc::new(FsSink::creating_parents());
    let pipeline = Arc::new(MapPipeline::from_config(&config, sink.clone())?);

    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.is_empty() {
        warn!("No input files given");
        return Ok(());
    }

    let start = Instant::now();
    let mut tasks = JoinSet::new();

    for path in files {
        if !input.is_match(&path) {
            debug!(path = %path, pattern = %config.pattern, "Not a map source, ignoring");
            continue;
        }
        let pipeline = Arc::clone(&pipeline);
        let sink = Arc::clone(&sink);
        tasks.spawn_blocking(move || process_file(&pipeline, &sink, path));
    }

    let mut summary = RunSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                error!(error = %e, "Worker task failed");
                summary.failed += 1;
            }
        }
    }

    info!(
        written = summary.written,
        cached = summary.cached,
        skipped = summary.skipped,
        failed = summary.failed,
        headers = pipeline.index().map_or(0, |index| index.len()),
        index = %pipeline.index().map_or_else(String::new, |index| index.path().display().to_string()),
        latency_ms = start.elapsed().as_millis() as u64,
        "Map sparser run complete"
    );

    if summary.failed > 0 {
        return Err(format!("{} map(s) failed", summary.failed).into());
    }

    Ok(())
}
