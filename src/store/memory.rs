//! In-memory [`VectorIndex`] for tests and throwaway runs.
//!
//! Chunks live in a `Vec` behind `std::sync::RwLock`; nearest-neighbour
//! search is brute-force cosine similarity.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::error::{DocentError, Result};
use crate::models::EmbeddedChunk;

use super::{rank_nearest, VectorIndex};

#[derive(Default)]
pub struct InMemoryIndex {
    chunks: RwLock<Vec<EmbeddedChunk>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored chunk in insertion order.
    pub fn chunks(&self) -> Vec<EmbeddedChunk> {
        self.chunks
            .read()
            .map(|chunks| chunks.clone())
            .unwrap_or_default()
    }
}

fn poisoned() -> DocentError {
    DocentError::StoreUnavailable("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(|_| poisoned())?;
        if chunks.iter().any(|c| c.id == chunk.id) {
            return Err(DocentError::StoreUnavailable(format!(
                "duplicate chunk id: {}",
                chunk.id
            )));
        }
        chunks.push(chunk.clone());
        Ok(())
    }

    async fn contains_filename(&self, filename: &str) -> Result<bool> {
        let chunks = self.chunks.read().map_err(|_| poisoned())?;
        Ok(chunks.iter().any(|c| c.metadata.filename == filename))
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<EmbeddedChunk>> {
        let chunks = self.chunks.read().map_err(|_| poisoned())?;
        Ok(rank_nearest(chunks.iter().cloned(), vector, k))
    }

    async fn chunk_count(&self, filename: &str) -> Result<usize> {
        let chunks = self.chunks.read().map_err(|_| poisoned())?;
        Ok(chunks
            .iter()
            .filter(|c| c.metadata.filename == filename)
            .count())
    }
}
