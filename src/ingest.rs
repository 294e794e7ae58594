//! Document write path: chunk → embed → save.
//!
//! Every write computes the full chunk set and its embeddings before the
//! store is touched, then hands both to
//! [`ChunkStore::save_document`], which swaps them in atomically. A chunking
//! or embedding failure therefore leaves the stored document unchanged.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunk::{build_chunks, chunk_text};
use crate::config::ChunkingConfig;
pub use crate::config::WritePath;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::{Chunk, Document, DocumentWithChunks};
use crate::store::ChunkStore;

pub struct DocumentPipeline {
    store: Arc<dyn ChunkStore>,
    embedder: Embedder,
    chunking: ChunkingConfig,
}

impl DocumentPipeline {
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Embedder, chunking: ChunkingConfig) -> Self {
        Self {
            store,
            embedder,
            chunking,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Chunk, embed, and store a new document.
    pub async fn create_document(
        &self,
        owner_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Document> {
        let now = Utc::now().timestamp();
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };

        let chunks = self.embedded_chunks(&doc, WritePath::Create).await?;
        self.store
            .save_document(&doc, &chunks)
            .await
            .map_err(Error::Store)?;

        info!(document.id = %doc.id, owner = owner_id, chunk_count = chunks.len(), "document created");
        Ok(doc)
    }

    /// Replace a document's content (and optionally its title), regenerating
    /// every chunk and embedding.
    ///
    /// # Errors
    ///
    /// [`Error::DocumentNotFound`] if `id` is unknown.
    pub async fn update_document(
        &self,
        id: &str,
        title: Option<&str>,
        content: &str,
    ) -> Result<Document> {
        let existing = self.get_document(id).await?.document;

        let doc = Document {
            title: title.map(str::to_string).unwrap_or(existing.title),
            content: content.to_string(),
            updated_at: Utc::now().timestamp().max(existing.updated_at),
            ..existing
        };

        let chunks = self.embedded_chunks(&doc, WritePath::Update).await?;
        self.store
            .save_document(&doc, &chunks)
            .await
            .map_err(Error::Store)?;

        info!(document.id = %doc.id, chunk_count = chunks.len(), "document updated");
        Ok(doc)
    }

    /// Delete a document and its chunks.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let deleted = self
            .store
            .delete_document(id)
            .await
            .map_err(Error::Store)?;
        if !deleted {
            return Err(Error::DocumentNotFound(id.to_string()));
        }
        info!(document.id = id, "document deleted");
        Ok(())
    }

    pub async fn get_document(&self, id: &str) -> Result<DocumentWithChunks> {
        self.store
            .get_document(id)
            .await
            .map_err(Error::Store)?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    pub async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>> {
        self.store
            .list_documents(owner_id)
            .await
            .map_err(Error::Store)
    }

    /// Chunk `content` with a write path's sizes without embedding or
    /// storing anything.
    pub fn preview_chunks(&self, content: &str, path: WritePath) -> Result<Vec<String>> {
        chunk_text(content, &self.chunking.params_for(path))
    }

    async fn embedded_chunks(&self, doc: &Document, path: WritePath) -> Result<Vec<Chunk>> {
        let params = self.chunking.params_for(path);
        let mut chunks = build_chunks(&doc.id, &doc.content, &params)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_chunks(&texts).await?;
        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            chunk.embedding = Some(vector);
        }

        debug!(
            document.id = %doc.id,
            chunk_count = chunks.len(),
            model = self.embedder.model_name(),
            "chunks embedded"
        );
        Ok(chunks)
    }
}
