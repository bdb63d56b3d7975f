//! Shared stubs for integration tests: a deterministic embedder, a reasoning
//! engine that retrieves once and cites what it got, a model catalog and a
//! recording progress reporter.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docent::agent::ReasoningEngine;
use docent::config::Config;
use docent::coordinator::AppContext;
use docent::embedding::Embedder;
use docent::error::{DocentError, Result};
use docent::models::{EmbeddingStatus, FileStatus};
use docent::progress::ProgressReporter;
use docent::readiness::ModelCatalog;
use docent::store::memory::InMemoryIndex;
use docent::store::VectorIndex;

pub const DIMS: usize = 64;

/// Bag-of-words hashed into a fixed number of buckets.
pub struct HashEmbedder {
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMS as u64) as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-64"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0.0f32; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(v)
    }
}

/// Never returns within any reasonable test timeout.
pub struct StalledEmbedder;

#[async_trait]
impl Embedder for StalledEmbedder {
    fn model_name(&self) -> &str {
        "stalled"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![0.0; DIMS])
    }
}

/// First call: retrieve using the question. Once an observation is in the
/// prompt: answer with the first passage and cite its filename and page.
pub struct CitingEngine {
    pub calls: AtomicUsize,
}

impl CitingEngine {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

fn line_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.rfind(marker)? + marker.len();
    text[start..].lines().next()
}

#[async_trait]
impl ReasoningEngine for CitingEngine {
    async fn reason(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(observation) = line_after(prompt, "Observation: ") else {
            let question = line_after(prompt, "Question: ").unwrap_or_default();
            return Ok(format!(
                " I need to look this up.\nAction: retrieve_information\nAction Input: {}",
                question
            ));
        };

        let passages: serde_json::Value = serde_json::from_str(observation)
            .map_err(|e| DocentError::Model(format!("bad observation: {e}")))?;
        let Some(first) = passages.as_array().and_then(|p| p.first()) else {
            return Ok(" Nothing found.\nFinal Answer: I don't know.".to_string());
        };
        let page = match &first["page"] {
            serde_json::Value::Number(n) => n.to_string(),
            other => other.as_str().unwrap_or("Unknown").to_string(),
        };
        Ok(format!(
            " I have the answer.\nFinal Answer: {} (Source: {}, Page: {})",
            first["content"].as_str().unwrap_or_default().trim(),
            first["filename"].as_str().unwrap_or("Unknown"),
            page
        ))
    }
}

/// Lists a fixed set of models.
pub struct StaticCatalog(pub Vec<String>);

impl StaticCatalog {
    pub fn with_llama3() -> Self {
        Self(vec!["llama3:latest".to_string()])
    }
}

#[async_trait]
impl ModelCatalog for StaticCatalog {
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Collects every reported status in order.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<EmbeddingStatus>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<EmbeddingStatus> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses_for(&self, filename: &str) -> Vec<FileStatus> {
        self.events()
            .into_iter()
            .filter(|e| e.filename == filename)
            .map(|e| e.status)
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: EmbeddingStatus) {
        self.events.lock().unwrap().push(event);
    }
}

/// Defaults pointed at `root/documents` and `root/data`, with a fast readiness gate.
pub fn test_config(root: &Path) -> Config {
    let mut cfg = Config::minimal();
    cfg.documents.dir = root.join("documents");
    cfg.db.path = root.join("data").join("docent.sqlite");
    cfg.readiness.max_attempts = 2;
    cfg.readiness.interval_secs = 0;
    cfg
}

/// An `AppContext` over an in-memory index and the deterministic stubs.
pub fn test_context(root: &Path) -> (Arc<AppContext>, Arc<InMemoryIndex>) {
    let index = Arc::new(InMemoryIndex::new());
    let ctx = AppContext::new(
        test_config(root),
        index.clone() as Arc<dyn VectorIndex>,
        Arc::new(HashEmbedder::new()),
        Arc::new(CitingEngine::new()),
        Arc::new(StaticCatalog::with_llama3()),
    );
    (Arc::new(ctx), index)
}

/// A single-page PDF showing `text` in Helvetica.
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
