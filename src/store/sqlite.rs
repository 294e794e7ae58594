//! SQLite-backed [`ChunkStore`] implementation.
//!
//! Embeddings are stored inline on the chunk row as little-endian `f32`
//! BLOBs and decoded once per row during a scan. Document upsert and chunk
//! replacement share one transaction.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Chunk, ChunkCandidate, Document, DocumentWithChunks};
use crate::similarity::{blob_to_vec, vec_to_blob};

use super::ChunkStore;

/// SQLite implementation of the [`ChunkStore`] trait.
///
/// Expects the schema created by [`run_migrations`](crate::migrate::run_migrations).
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_document(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn decode_embedding(row: &SqliteRow) -> Option<Vec<f32>> {
    row.get::<Option<Vec<u8>>, _>("embedding")
        .map(|blob| blob_to_vec(&blob))
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn save_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, title, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.owner_id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            let blob = chunk.embedding.as_deref().map(vec_to_blob);
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, content, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&doc.id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(&chunk.hash)
            .bind(blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentWithChunks>> {
        let doc_row = sqlx::query(
            "SELECT id, owner_id, title, content, created_at, updated_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let document = match doc_row {
            Some(row) => row_to_document(&row),
            None => return Ok(None),
        };

        let chunk_rows = sqlx::query(
            r#"
            SELECT id, document_id, chunk_index, content, hash, embedding
            FROM chunks
            WHERE document_id = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let chunks = chunk_rows
            .iter()
            .map(|row| Chunk {
                id: row.get("id"),
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                content: row.get("content"),
                hash: row.get("hash"),
                embedding: decode_embedding(row),
            })
            .collect();

        Ok(Some(DocumentWithChunks { document, chunks }))
    }

    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, title, content, created_at, updated_at
            FROM documents
            WHERE owner_id = ?
            ORDER BY updated_at DESC, id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan_candidates(&self, owner_id: &str) -> Result<Vec<ChunkCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, d.title, c.chunk_index, c.content, c.embedding
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.owner_id = ?
            ORDER BY c.document_id ASC, c.chunk_index ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ChunkCandidate {
                chunk_id: row.get("id"),
                document_id: row.get("document_id"),
                document_title: row.get("title"),
                chunk_index: row.get("chunk_index"),
                content: row.get("content"),
                embedding: decode_embedding(row),
            })
            .collect())
    }
}
