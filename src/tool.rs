//! Actions the reasoning loop can take.
//!
//! A [`Tool`] takes the raw `Action Input` text and returns the observation
//! text fed back to the reasoning engine. The [`ToolRegistry`] is what the
//! agent renders into its prompt and dispatches against by name.
//!
//! The only built-in tool is [`RetrieveInformationTool`], a read-only
//! wrapper around [`DocumentStore::nearest_by_text`].

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::EmbeddedChunk;
use crate::store::DocumentStore;

/// Name under which the retrieval tool is registered.
pub const RETRIEVE_INFORMATION: &str = "retrieve_information";

const UNKNOWN: &str = "Unknown";

/// An action the reasoning engine may request.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Identifier used on the `Action:` line.
    fn name(&self) -> &str;

    /// One-line description rendered into the prompt.
    fn description(&self) -> &str;

    /// Run the tool on the raw action input and return the observation.
    async fn invoke(&self, input: &str) -> Result<String>;
}

/// The set of tools offered to the reasoning loop.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding only the retrieval tool over `store`.
    pub fn with_retrieval(store: DocumentStore, k: usize) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RetrieveInformationTool::new(store, k)));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Comma-separated tool names, as listed in the prompt and in unknown-tool observations.
    pub fn names(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `name: description` lines for the prompt.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A retrieved passage as shown to the reasoning engine.
#[derive(Debug, Serialize)]
pub struct Passage {
    pub content: String,
    pub source: String,
    pub filename: String,
    pub page: PageLabel,
}

/// Page number when known, otherwise the string `"Unknown"`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PageLabel {
    Number(u32),
    Unknown(&'static str),
}

impl From<EmbeddedChunk> for Passage {
    fn from(chunk: EmbeddedChunk) -> Self {
        let filename = if chunk.metadata.filename.is_empty() {
            UNKNOWN.to_string()
        } else {
            chunk.metadata.filename
        };
        Self {
            content: chunk.content,
            source: chunk.metadata.source.unwrap_or_else(|| UNKNOWN.to_string()),
            filename,
            page: chunk
                .metadata
                .page
                .map(PageLabel::Number)
                .unwrap_or(PageLabel::Unknown(UNKNOWN)),
        }
    }
}

/// Nearest-neighbour lookup over the document store.
///
/// Never fails the loop: store or embedding errors are logged and an empty
/// list is returned as the observation.
pub struct RetrieveInformationTool {
    store: DocumentStore,
    k: usize,
}

impl RetrieveInformationTool {
    pub fn new(store: DocumentStore, k: usize) -> Self {
        Self { store, k }
    }

    pub async fn passages(&self, query: &str) -> Result<Vec<Passage>> {
        let chunks = self.store.nearest_by_text(query, self.k).await?;
        Ok(chunks.into_iter().map(Passage::from).collect())
    }
}

#[async_trait]
impl Tool for RetrieveInformationTool {
    fn name(&self) -> &str {
        RETRIEVE_INFORMATION
    }

    fn description(&self) -> &str {
        "Retrieve relevant information from the document database"
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        debug!(query = input, "retrieve_information called");
        let passages = match self.passages(input).await {
            Ok(passages) => passages,
            Err(e) => {
                warn!(error = %e, "retrieval failed, returning no passages");
                Vec::new()
            }
        };
        Ok(serde_json::to_string(&passages).unwrap_or_else(|_| "[]".to_string()))
    }
}
