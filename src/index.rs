//! The search-index seam.
//!
//! The index is an external collaborator: reconciliation only ever
//! touches it through the narrow [`SearchIndex`] trait. Two
//! implementations ship here — a SQLite-backed index storing chunk text
//! plus embedding blobs, and an in-memory index for tests.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::IndexError;

/// A fragment of a resource's content plus its embedding.
///
/// Identity is the deterministic `(resource_hash, chunk_index)` pair;
/// `id` is its string form `<hash>:<index>`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub id: String,
    pub resource_hash: String,
    pub chunk_index: i64,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

/// Narrow interface to wherever chunks and embeddings live.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Replace all chunks for `resource_hash` with `chunks`.
    async fn upsert_chunks(
        &self,
        resource_hash: &str,
        chunks: &[IndexedChunk],
    ) -> Result<(), IndexError>;

    /// Remove every chunk belonging to `resource_hash`.
    async fn delete_by_hash(&self, resource_hash: &str) -> Result<(), IndexError>;

    /// The set of resource hashes currently present in the index.
    async fn list_indexed_hashes(&self) -> Result<HashSet<String>, IndexError>;
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn backend_err(e: sqlx::Error) -> IndexError {
    IndexError::Backend(e.to_string())
}

/// SQLite-backed search index.
pub struct SqliteSearchIndex {
    pool: SqlitePool,
}

impl SqliteSearchIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `chunks` table. Idempotent.
    pub async fn migrate(&self) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                resource_hash TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB,
                UNIQUE(resource_hash, chunk_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_resource_hash ON chunks(resource_hash)")
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(())
    }

    /// Chunks stored under a hash, ordered by index. Read interface for
    /// retrieval consumers and tests.
    pub async fn chunks_for_hash(
        &self,
        resource_hash: &str,
    ) -> Result<Vec<IndexedChunk>, IndexError> {
        let rows = sqlx::query(
            "SELECT id, resource_hash, chunk_index, text, embedding
             FROM chunks WHERE resource_hash = ? ORDER BY chunk_index",
        )
        .bind(resource_hash)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(rows
            .iter()
            .map(|row| IndexedChunk {
                id: row.get("id"),
                resource_hash: row.get("resource_hash"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                embedding: row
                    .get::<Option<Vec<u8>>, _>("embedding")
                    .map(|blob| blob_to_vec(&blob)),
            })
            .collect())
    }
}

#[async_trait]
impl SearchIndex for SqliteSearchIndex {
    async fn upsert_chunks(
        &self,
        resource_hash: &str,
        chunks: &[IndexedChunk],
    ) -> Result<(), IndexError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        // Chunk count is content-determined, so delete-then-insert in
        // one transaction keeps identical content a pure no-op and
        // drops leftovers from any previous content under this hash.
        sqlx::query("DELETE FROM chunks WHERE resource_hash = ?")
            .bind(resource_hash)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, resource_hash, chunk_index, text, embedding)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.resource_hash)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.embedding.as_deref().map(vec_to_blob))
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        }

        tx.commit().await.map_err(backend_err)
    }

    async fn delete_by_hash(&self, resource_hash: &str) -> Result<(), IndexError> {
        sqlx::query("DELETE FROM chunks WHERE resource_hash = ?")
            .bind(resource_hash)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn list_indexed_hashes(&self) -> Result<HashSet<String>, IndexError> {
        let rows = sqlx::query("SELECT DISTINCT resource_hash FROM chunks")
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(rows.iter().map(|row| row.get("resource_hash")).collect())
    }
}

/// In-memory search index for tests.
#[derive(Default)]
pub struct MemorySearchIndex {
    chunks: RwLock<HashMap<String, Vec<IndexedChunk>>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks_for_hash(&self, resource_hash: &str) -> Vec<IndexedChunk> {
        self.chunks
            .read()
            .expect("index lock poisoned")
            .get(resource_hash)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn upsert_chunks(
        &self,
        resource_hash: &str,
        chunks: &[IndexedChunk],
    ) -> Result<(), IndexError> {
        self.chunks
            .write()
            .expect("index lock poisoned")
            .insert(resource_hash.to_string(), chunks.to_vec());
        Ok(())
    }

    async fn delete_by_hash(&self, resource_hash: &str) -> Result<(), IndexError> {
        self.chunks
            .write()
            .expect("index lock poisoned")
            .remove(resource_hash);
        Ok(())
    }

    async fn list_indexed_hashes(&self) -> Result<HashSet<String>, IndexError> {
        Ok(self
            .chunks
            .read()
            .expect("index lock poisoned")
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_content;
    use crate::db;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    async fn sqlite_index() -> SqliteSearchIndex {
        let pool = db::connect_memory().await.unwrap();
        let index = SqliteSearchIndex::new(pool);
        index.migrate().await.unwrap();
        index
    }

    #[tokio::test]
    async fn test_sqlite_upsert_list_delete() {
        let index = sqlite_index().await;
        let chunks = chunk_content("abc123", "hello world", 1000, 0);
        index.upsert_chunks("abc123", &chunks).await.unwrap();

        let hashes = index.list_indexed_hashes().await.unwrap();
        assert!(hashes.contains("abc123"));
        assert_eq!(index.chunks_for_hash("abc123").await.unwrap().len(), 1);

        index.delete_by_hash("abc123").await.unwrap();
        assert!(index.list_indexed_hashes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_upsert_identical_content_is_stable() {
        let index = sqlite_index().await;
        let chunks = chunk_content("abc123", "some content here", 8, 2);
        index.upsert_chunks("abc123", &chunks).await.unwrap();
        index.upsert_chunks("abc123", &chunks).await.unwrap();

        let stored = index.chunks_for_hash("abc123").await.unwrap();
        assert_eq!(stored.len(), chunks.len());
        for (stored, expected) in stored.iter().zip(chunks.iter()) {
            assert_eq!(stored.id, expected.id);
        }
    }

    #[tokio::test]
    async fn test_sqlite_embedding_blob_persisted() {
        let index = sqlite_index().await;
        let mut chunks = chunk_content("abc123", "embed me", 1000, 0);
        chunks[0].embedding = Some(vec![0.25, -1.0, 2.0]);
        index.upsert_chunks("abc123", &chunks).await.unwrap();

        let stored = index.chunks_for_hash("abc123").await.unwrap();
        assert_eq!(stored[0].embedding.as_deref(), Some(&[0.25, -1.0, 2.0][..]));
    }

    #[tokio::test]
    async fn test_memory_index_basic_flow() {
        let index = MemorySearchIndex::new();
        let chunks = chunk_content("def456", "memory chunks", 1000, 0);
        index.upsert_chunks("def456", &chunks).await.unwrap();
        assert_eq!(index.chunks_for_hash("def456").len(), 1);

        index.delete_by_hash("def456").await.unwrap();
        assert!(index.list_indexed_hashes().await.unwrap().is_empty());
    }
}
