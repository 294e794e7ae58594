//! Core data models used throughout doc-rag.
//!
//! These types represent the documents, chunks, candidates, and scored
//! results that flow through the write and retrieval paths.

use serde::Serialize;

/// A user-owned document. Owns its chunks; deleting it deletes them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A window of a document's text with its embedding.
///
/// `chunk_index` values for one document form a dense `0..N-1` sequence in
/// reading order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    /// SHA-256 hex digest of `content`.
    pub hash: String,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

/// A document together with its chunks in `chunk_index` order.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWithChunks {
    pub document: Document,
    pub chunks: Vec<Chunk>,
}

/// One row of the retrieval scan set.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub chunk_index: i64,
    pub content: String,
    /// Candidates without an embedding are never scored.
    pub embedding: Option<Vec<f32>>,
}

/// A candidate chunk with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub chunk_index: i64,
    pub content: String,
    /// Cosine similarity, nominally in `[-1.0, 1.0]`.
    pub score: f64,
}
