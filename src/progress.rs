//! Ingestion progress reporting.
//!
//! The pipeline reports every per-file status transition through a
//! [`ProgressReporter`]. In the server the reporter is the
//! [`Broadcaster`](crate::events::Broadcaster), which fans events out to
//! connected observers; the `docent ingest` command uses one of the stderr
//! reporters below so stdout stays parseable for scripts.

use std::io::Write;

use crate::models::EmbeddingStatus;

/// Receives per-file status transitions. Called synchronously by the pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: EmbeddingStatus);
}

/// Human-friendly progress on stderr: "report.pdf  embedding".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: EmbeddingStatus) {
        let line = format!("{}  {}\n", event.filename, event.status);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: EmbeddingStatus) {
        let obj = serde_json::json!({
            "event": "embeddingStatus",
            "filename": event.filename,
            "status": event.status,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: EmbeddingStatus) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
