//! Vector index abstraction and the document store adapter.
//!
//! The [`VectorIndex`] trait is the narrow interface this service needs from
//! a vector database: insert a chunk, ask whether any chunk belongs to a
//! filename, and fetch the nearest chunks to a vector. Two backends ship
//! with the crate:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`sqlite::SqliteIndex`] | Persistent index, brute-force cosine search |
//! | [`memory::InMemoryIndex`] | Tests and throwaway runs |
//!
//! [`DocumentStore`] sits on top and adds embedding, so ingestion and the
//! retrieval tool can work in terms of text.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::Result;
use crate::models::{ChunkMetadata, ContentSegment, DocumentFile, EmbeddedChunk};

/// Storage backend for embedded chunks.
///
/// Chunks are only ever inserted; nothing in this crate updates or deletes them.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append a chunk to the index. A chunk id that already exists is an error.
    async fn insert(&self, chunk: &EmbeddedChunk) -> Result<()>;

    /// True iff at least one chunk carries `filename` in its metadata.
    async fn contains_filename(&self, filename: &str) -> Result<bool>;

    /// The `k` chunks most similar to `vector`, nearest first.
    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<EmbeddedChunk>>;

    /// Number of chunks stored for `filename`.
    async fn chunk_count(&self, filename: &str) -> Result<usize>;
}

/// Score candidates by cosine similarity against `query` and keep the best `k`.
pub(crate) fn rank_nearest(
    candidates: impl IntoIterator<Item = EmbeddedChunk>,
    query: &[f32],
    k: usize,
) -> Vec<EmbeddedChunk> {
    let mut scored: Vec<(f32, EmbeddedChunk)> = candidates
        .into_iter()
        .map(|c| (cosine_similarity(query, &c.embedding), c))
        .collect();

    // Stable sort keeps insertion order among equal scores.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored.into_iter().map(|(_, c)| c).collect()
}

/// Text-level access to the vector index used by ingestion and retrieval.
#[derive(Clone)]
pub struct DocumentStore {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl DocumentStore {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }

    /// Whether `filename` already has chunks in the index.
    ///
    /// Connection failures surface as `StoreUnavailable`; no retry happens here.
    pub async fn exists(&self, filename: &str) -> Result<bool> {
        debug!(filename, "checking index for existing chunks");
        self.index.contains_filename(filename).await
    }

    /// Embed one segment and append it as a chunk tagged with the file's name.
    ///
    /// Does not deduplicate; callers check [`exists`](Self::exists) first.
    pub async fn insert(&self, file: &DocumentFile, segment: &ContentSegment) -> Result<()> {
        let embedding = self.embedder.embed(&segment.text).await?;
        let chunk = EmbeddedChunk {
            id: Uuid::new_v4().to_string(),
            content: segment.text.clone(),
            metadata: ChunkMetadata {
                filename: file.filename.clone(),
                source: Some(file.path.display().to_string()),
                page: segment.page,
            },
            embedding,
        };
        self.index.insert(&chunk).await
    }

    /// Embed `query` and return the `k` nearest chunks, nearest first.
    pub async fn nearest_by_text(&self, query: &str, k: usize) -> Result<Vec<EmbeddedChunk>> {
        let vector = self.embedder.embed(query).await?;
        self.index.nearest(&vector, k).await
    }
}
