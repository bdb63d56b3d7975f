//! Core data types that flow between ingestion, storage, events and the agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file in the watched documents directory. Identity is the filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub filename: String,
    pub path: PathBuf,
}

impl DocumentFile {
    pub fn new(dir: &Path, filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            path: dir.join(filename),
        }
    }
}

/// A piece of extracted text, ready to be embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSegment {
    pub text: String,
    /// 1-based page number for paginated formats.
    pub page: Option<u32>,
}

impl ContentSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: None,
        }
    }

    pub fn with_page(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page: Some(page),
        }
    }
}

/// Metadata persisted alongside every chunk in the vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A (content, metadata, vector) triple as stored in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// Per-file ingestion state. Transitions only `Embedding -> Embedded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Embedding,
    Embedded,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Embedding => write!(f, "embedding"),
            FileStatus::Embedded => write!(f, "embedded"),
        }
    }
}

/// A progress event emitted by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingStatus {
    pub filename: String,
    pub status: FileStatus,
}

impl EmbeddingStatus {
    pub fn embedding(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Embedding,
        }
    }

    pub fn embedded(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Embedded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(EmbeddingStatus::embedding("a.pdf")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "filename": "a.pdf", "status": "embedding" })
        );
    }

    #[test]
    fn metadata_omits_missing_fields() {
        let meta = ChunkMetadata {
            filename: "notes.txt".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"filename":"notes.txt"}"#);
    }
}
