//! Process-wide application context.
//!
//! [`AppContext`] is built once at startup and shared as `Arc<AppContext>`
//! by the server and CLI. It owns the readiness flag, the document store,
//! the event broadcaster and the agent, and exposes the operations the
//! HTTP handlers and commands call.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::agent::{Agent, ReasoningEngine};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::DocentError;
use crate::events::Broadcaster;
use crate::ingest::{self, IngestReport};
use crate::ollama::OllamaClient;
use crate::readiness::{ModelCatalog, ReadinessGate};
use crate::store::sqlite::SqliteIndex;
use crate::store::{DocumentStore, VectorIndex};
use crate::tool::ToolRegistry;

pub struct AppContext {
    config: Config,
    store: DocumentStore,
    events: Broadcaster,
    agent: Agent,
    catalog: Arc<dyn ModelCatalog>,
    ready: AtomicBool,
    /// Serializes pipeline runs so overlapping passes cannot insert the same file twice.
    ingest_lock: Mutex<()>,
}

impl AppContext {
    pub fn new(
        config: Config,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        engine: Arc<dyn ReasoningEngine>,
        catalog: Arc<dyn ModelCatalog>,
    ) -> Self {
        let store = DocumentStore::new(index, embedder);
        let tools = ToolRegistry::with_retrieval(store.clone(), config.agent.retrieval_k);
        let agent = Agent::new(engine, tools, config.agent.max_iterations);
        let events = Broadcaster::new(config.events.history_capacity);
        Self {
            config,
            store,
            events,
            agent,
            catalog,
            ready: AtomicBool::new(false),
            ingest_lock: Mutex::new(()),
        }
    }

    /// Wire the production collaborators: the SQLite index and one Ollama client.
    pub async fn connect(config: Config) -> Result<Self> {
        let index = SqliteIndex::open(&config.db.path).await?;
        let ollama = Arc::new(OllamaClient::new(&config.model)?);
        Ok(Self::new(
            config,
            Arc::new(index),
            ollama.clone(),
            ollama.clone(),
            ollama,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn events(&self) -> &Broadcaster {
        &self.events
    }

    pub fn documents_dir(&self) -> &Path {
        &self.config.documents.dir
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Wait for the model, mark the service ready, then ingest the whole directory.
    ///
    /// A model that never appears fails with `ServiceUnavailable` and nothing
    /// else happens.
    pub async fn startup(&self) -> Result<IngestReport> {
        info!("starting agent initialization");
        tokio::fs::create_dir_all(self.documents_dir())
            .await
            .with_context(|| {
                format!(
                    "Failed to create documents directory: {}",
                    self.documents_dir().display()
                )
            })?;

        self.wait_for_model().await?;
        self.mark_ready();
        self.check_documents().await
    }

    /// Run the readiness gate against the model service.
    pub async fn wait_for_model(&self) -> Result<u32, DocentError> {
        ReadinessGate::from_config(&self.config)
            .ensure_model_ready(self.catalog.as_ref())
            .await
    }

    /// Set the readiness flag and announce it. Only the first call has any effect.
    pub fn mark_ready(&self) -> bool {
        let first = self
            .ready
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if first {
            info!("agent initialization complete, emitting agentReady");
            self.events.publish_agent_ready(true);
        }
        first
    }

    /// Full pipeline pass over the documents directory.
    pub async fn check_documents(&self) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;
        ingest::run(
            &self.store,
            self.documents_dir(),
            None,
            &self.events,
            &self.config.ingest,
        )
        .await
    }

    /// Pipeline pass restricted to one file of the documents directory.
    pub async fn embed_document(&self, filename: &str) -> Result<IngestReport> {
        let filename = sanitize_filename(filename)
            .with_context(|| format!("Invalid document name: {:?}", filename))?;
        info!(filename = %filename, "processing new document");
        let _guard = self.ingest_lock.lock().await;
        let report = ingest::run(
            &self.store,
            self.documents_dir(),
            Some(&filename),
            &self.events,
            &self.config.ingest,
        )
        .await?;
        info!(filename = %filename, "finished processing document");
        Ok(report)
    }

    /// Spawn [`embed_document`](Self::embed_document) in the background, logging failures.
    pub fn spawn_embed(self: &Arc<Self>, filename: String) {
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = ctx.embed_document(&filename).await {
                error!(filename = %filename, error = %e, "background ingestion failed");
            }
        });
    }

    /// Raw listing of the documents directory.
    pub fn list_documents(&self) -> Result<Vec<String>> {
        ingest::list_documents(self.documents_dir())
    }

    /// Store an uploaded file under its own name in the documents directory.
    ///
    /// Directory components of `name` are discarded. Returns the stored filename.
    pub async fn save_upload(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let filename = sanitize_filename(name)
            .with_context(|| format!("Invalid upload filename: {:?}", name))?;
        let dir = self.documents_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create documents directory: {}", dir.display()))?;

        let path: PathBuf = dir.join(&filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;
        info!(filename = %filename, bytes = bytes.len(), "new document uploaded");
        Ok(filename)
    }

    /// Answer a question about `context`. Refuses until the service is ready.
    pub async fn answer(&self, question: &str, context: &str) -> Result<String, DocentError> {
        if !self.is_ready() {
            return Err(DocentError::AgentNotReady);
        }
        info!(query = question, context, "query received");
        Ok(self.agent.answer(question, context).await)
    }
}

/// The final path component of `name`, otherwise unchanged, or `None` if
/// nothing usable remains.
///
/// Both `/` and `\` count as separators, so `..\..\x.pdf` becomes `x.pdf`.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?;
    if last.trim().is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}
