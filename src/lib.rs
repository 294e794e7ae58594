//! # doc-rag
//!
//! Retrieval core for document question answering: sentence-aware chunking
//! with overlap, injected embedding providers, and brute-force cosine search
//! with a per-document diversity cap.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Document │──▶│   Chunker   │──▶│   Embedder   │
//! │  text    │   │ sentences + │   │ batched,     │
//! └──────────┘   │ overlap     │   │ bounded      │
//!                └─────────────┘   └──────┬───────┘
//!                                         ▼
//!                                  ┌──────────────┐
//!                  query ─────────▶│  ChunkStore  │
//!                    │             │ memory/SQLite│
//!                    ▼             └──────┬───────┘
//!               ┌──────────┐  full scan   │
//!               │ Retriever│◀─────────────┘
//!               │ rank +   │
//!               │ diversity│──▶ [ScoredChunk]
//!               └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Sentence splitting and overlapping windows |
//! | [`similarity`] | Cosine similarity and vector BLOB codec |
//! | [`search`] | Ranking, near-tie ordering, diversity selection |
//! | [`embedding`] | Provider trait, HTTP providers, batched embedder |
//! | [`store`] | Chunk store trait with in-memory and SQLite backends |
//! | [`ingest`] | Document create / update / delete pipeline |
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`error`] | Typed error taxonomy |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema creation |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod search;
pub mod similarity;
pub mod store;

pub use error::{Error, Result};
