//! Ingestion pipeline.
//!
//! Walks the documents directory (or a single named file in it) and, for
//! each file in name order:
//!
//! 1. `embedded` right away if the index already holds chunks for it;
//! 2. otherwise `embedding`, extract segments with the format's loader,
//!    split oversized segments, insert each one, then `embedded`.
//!
//! Files are processed one at a time. Any per-file failure (unsupported
//! format, extraction error, store or model error, timeout) is logged and
//! counted; the file never reaches `embedded` and is retried on the next
//! full pass. Only a failure to list the directory is returned to the caller.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunk::split_segments;
use crate::config::IngestConfig;
use crate::error::DocentError;
use crate::extract::load_file;
use crate::models::{DocumentFile, EmbeddingStatus};
use crate::progress::ProgressReporter;
use crate::store::DocumentStore;

/// Outcome counts of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files extracted and inserted during this run.
    pub embedded: usize,
    /// Files already present in the index.
    pub skipped: usize,
    /// Files that failed and were left for the next pass.
    pub failed: usize,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "embedded: {}, already embedded: {}, failed: {}",
            self.embedded, self.skipped, self.failed
        )
    }
}

enum FileOutcome {
    Embedded { chunks: usize },
    AlreadyEmbedded,
}

/// Regular, non-hidden files directly inside `dir`, sorted by name.
pub fn list_documents(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry
            .with_context(|| format!("Failed to read documents directory: {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

/// Run one ingestion pass over `dir`, or only over `target` when given.
pub async fn run(
    store: &DocumentStore,
    dir: &Path,
    target: Option<&str>,
    reporter: &dyn ProgressReporter,
    config: &IngestConfig,
) -> Result<IngestReport> {
    let filenames = match target {
        Some(name) => vec![name.to_string()],
        None => list_documents(dir)?,
    };
    debug!(dir = %dir.display(), files = filenames.len(), "starting ingestion pass");

    let mut report = IngestReport::default();
    for filename in filenames {
        let file = DocumentFile::new(dir, &filename);
        let outcome = tokio::time::timeout(
            config.file_timeout(),
            ingest_file(store, &file, reporter, config.max_segment_chars),
        )
        .await;

        match outcome {
            Ok(Ok(FileOutcome::Embedded { chunks })) => {
                info!(filename = %filename, chunks, "document embedded");
                report.embedded += 1;
            }
            Ok(Ok(FileOutcome::AlreadyEmbedded)) => {
                debug!(filename = %filename, "document already embedded, skipping");
                report.skipped += 1;
            }
            Ok(Err(e)) => {
                warn!(filename = %filename, error = %e, "failed to process document");
                report.failed += 1;
            }
            Err(_) => {
                warn!(
                    filename = %filename,
                    timeout_secs = config.file_timeout().as_secs(),
                    "timed out processing document"
                );
                report.failed += 1;
            }
        }
    }

    info!(%report, "ingestion pass finished");
    Ok(report)
}

async fn ingest_file(
    store: &DocumentStore,
    file: &DocumentFile,
    reporter: &dyn ProgressReporter,
    max_segment_chars: usize,
) -> Result<FileOutcome, DocentError> {
    if store.exists(&file.filename).await? {
        reporter.report(EmbeddingStatus::embedded(&file.filename));
        return Ok(FileOutcome::AlreadyEmbedded);
    }

    reporter.report(EmbeddingStatus::embedding(&file.filename));

    // Loaders are synchronous; a panicking PDF parser surfaces as a join error.
    let path = file.path.clone();
    let segments = tokio::task::spawn_blocking(move || load_file(&path))
        .await
        .map_err(|e| DocentError::extraction(&file.path, format!("loader crashed: {}", e)))??;

    let segments = split_segments(segments, max_segment_chars);
    if segments.is_empty() {
        return Err(DocentError::extraction(&file.path, "no text content"));
    }

    for segment in &segments {
        store.insert(file, segment).await?;
    }

    reporter.report(EmbeddingStatus::embedded(&file.filename));
    Ok(FileOutcome::Embedded {
        chunks: segments.len(),
    })
}
