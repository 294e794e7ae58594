//! In-memory [`ChunkStore`] implementation for tests and embedding hosts.
//!
//! Documents and chunks live behind a single `std::sync::RwLock`, so a
//! chunk replacement is never observed half-done.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Chunk, ChunkCandidate, Document, DocumentWithChunks};

use super::ChunkStore;

#[derive(Default)]
struct State {
    docs: HashMap<String, Document>,
    /// Chunks per document, kept in `chunk_index` order.
    chunks: HashMap<String, Vec<Chunk>>,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn save_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut stored = chunks.to_vec();
        stored.sort_by_key(|c| c.chunk_index);

        let mut state = self.write()?;
        let mut doc = doc.clone();
        if let Some(existing) = state.docs.get(&doc.id) {
            // creation metadata is fixed at first insert
            doc.owner_id = existing.owner_id.clone();
            doc.created_at = existing.created_at;
        }
        state.chunks.insert(doc.id.clone(), stored);
        state.docs.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentWithChunks>> {
        let state = self.read()?;
        Ok(state.docs.get(id).map(|doc| DocumentWithChunks {
            document: doc.clone(),
            chunks: state.chunks.get(id).cloned().unwrap_or_default(),
        }))
    }

    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>> {
        let state = self.read()?;
        let mut docs: Vec<Document> = state
            .docs
            .values()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut state = self.write()?;
        state.chunks.remove(id);
        Ok(state.docs.remove(id).is_some())
    }

    async fn scan_candidates(&self, owner_id: &str) -> Result<Vec<ChunkCandidate>> {
        let state = self.read()?;

        let mut docs: Vec<&Document> = state
            .docs
            .values()
            .filter(|d| d.owner_id == owner_id)
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        let candidates = docs
            .into_iter()
            .flat_map(|doc| {
                state
                    .chunks
                    .get(&doc.id)
                    .into_iter()
                    .flatten()
                    .map(move |c| ChunkCandidate {
                        chunk_id: c.id.clone(),
                        document_id: doc.id.clone(),
                        document_title: doc.title.clone(),
                        chunk_index: c.chunk_index,
                        content: c.content.clone(),
                        embedding: c.embedding.clone(),
                    })
            })
            .collect();

        Ok(candidates)
    }
}
