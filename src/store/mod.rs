//! Storage abstraction for documents and their embedded chunks.
//!
//! The [`ChunkStore`] trait defines everything the write pipeline and the
//! retriever need from a backend. Implementations must be `Send + Sync` to
//! work with async runtimes.
//!
//! Chunk regeneration is atomic from a searcher's point of view:
//! [`save_document`](ChunkStore::save_document) replaces a document's whole
//! chunk set in one step, so a concurrent
//! [`scan_candidates`](ChunkStore::scan_candidates) sees either the old set
//! or the new one.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ChunkCandidate, Document, DocumentWithChunks};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_document`](ChunkStore::save_document) | Upsert a document and replace its chunks |
/// | [`get_document`](ChunkStore::get_document) | Document plus chunks in `chunk_index` order |
/// | [`list_documents`](ChunkStore::list_documents) | An owner's documents, newest first |
/// | [`delete_document`](ChunkStore::delete_document) | Delete a document and its chunks |
/// | [`scan_candidates`](ChunkStore::scan_candidates) | Full scan of an owner's chunks for retrieval |
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert or update `doc` and replace all of its chunks with `chunks`.
    async fn save_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<DocumentWithChunks>>;

    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>>;

    /// Delete a document and cascade to its chunks. Returns `false` if the
    /// document did not exist.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    /// Every chunk of the owner's documents, ordered by document and then
    /// `chunk_index`. Chunks without an embedding are included with
    /// `embedding: None`.
    async fn scan_candidates(&self, owner_id: &str) -> Result<Vec<ChunkCandidate>>;
}
