//! SQLite-backed [`VectorIndex`].
//!
//! One row per chunk in the `chunks` table; vectors are little-endian f32
//! BLOBs and nearest-neighbour search is brute-force cosine similarity over
//! every stored vector.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::Result;
use crate::migrate;
use crate::models::{ChunkMetadata, EmbeddedChunk};

use super::{rank_nearest, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to (creating if needed) the database at `path` and ensure the schema.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn insert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        let metadata_json = serde_json::to_string(&chunk.metadata)
            .map_err(|e| crate::error::DocentError::StoreUnavailable(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO chunks (id, filename, content, metadata_json, embedding, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.metadata.filename)
        .bind(&chunk.content)
        .bind(&metadata_json)
        .bind(vec_to_blob(&chunk.embedding))
        .bind(chunk.embedding.len() as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn contains_filename(&self, filename: &str) -> Result<bool> {
        // Scoped connection: returned to the pool when `conn` drops.
        let mut conn = self.pool.acquire().await?;
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM chunks WHERE filename = ?)")
                .bind(filename)
                .fetch_one(&mut *conn)
                .await?;
        Ok(found != 0)
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<EmbeddedChunk>> {
        let rows = sqlx::query(
            "SELECT id, filename, content, metadata_json, embedding FROM chunks ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows.iter().map(|row| {
            let filename: String = row.get("filename");
            let metadata_json: String = row.get("metadata_json");
            let mut metadata: ChunkMetadata =
                serde_json::from_str(&metadata_json).unwrap_or_default();
            metadata.filename = filename;
            let blob: Vec<u8> = row.get("embedding");
            EmbeddedChunk {
                id: row.get("id"),
                content: row.get("content"),
                metadata,
                embedding: blob_to_vec(&blob),
            }
        });

        Ok(rank_nearest(candidates, vector, k))
    }

    async fn chunk_count(&self, filename: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE filename = ?")
            .bind(filename)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
