//! Error types for chunking, embedding, storage, and retrieval.
//!
//! Providers and stores report failures as [`anyhow::Error`]; the pipeline
//! and retriever translate them into [`Error`] so callers can tell an
//! embedding outage from a storage fault from a contract violation.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the retrieval core.
#[derive(Debug, Error)]
pub enum Error {
    /// Chunk sizes violate the chunker's contract.
    #[error("invalid chunk parameters: {0}")]
    InvalidChunkParams(String),

    /// A search was requested with a result limit of zero.
    #[error("search limit must be at least 1")]
    InvalidLimit,

    /// The embedding provider failed or returned a malformed response.
    #[error("embedding failed ({provider}): {message}")]
    Embedding {
        /// Model name reported by the provider.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding provider did not answer within its timeout.
    #[error("embedding timed out ({provider}) after {timeout:?}")]
    EmbeddingTimeout { provider: String, timeout: Duration },

    /// No document exists with the given id.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// The backing chunk store failed.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl Error {
    /// True for failures of the embedding provider (including timeouts).
    ///
    /// Callers use this to decide between retrying and aborting.
    pub fn is_embedding(&self) -> bool {
        matches!(self, Error::Embedding { .. } | Error::EmbeddingTimeout { .. })
    }
}

/// A convenience result type for retrieval-core operations.
pub type Result<T> = std::result::Result<T, Error>;
