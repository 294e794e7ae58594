//! Sentence-aligned text chunker with trailing overlap.
//!
//! Splits document text into windows that respect a `target_size` (in
//! characters) without ever cutting a sentence, and carries the tail of each
//! window into the next so that context spanning a boundary is embedded
//! twice.
//!
//! # Algorithm
//!
//! 1. Split text into sentences at terminator characters. The terminator
//!    (and any whitespace following it) stays with the preceding sentence;
//!    a run such as `"?!"` or `"...\n"` is one boundary.
//! 2. Accumulate sentences into a window. When the next sentence would push
//!    the window past `target_size`, flush the window as a chunk.
//! 3. Seed the next window with the trailing sentences of the flushed one,
//!    walking backward until at least `overlap_size` characters are carried.
//! 4. Flush the last window. If nothing was produced, return the input
//!    untouched as a single chunk.
//!
//! # Example
//!
//! ```rust
//! use doc_rag::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(10, 5);
//! let chunks = chunk_text("S1. S2. S3. S4. S5.", &params).unwrap();
//! assert!(chunks.len() >= 2);
//! assert_eq!(chunks[0], "S1. S2.");
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Default sentence terminators: full-width and ASCII period, exclamation
/// and question marks, plus newline.
pub const DEFAULT_TERMINATORS: &str = ".!?。！？\n";

/// Window sizes and sentence terminators for one chunking pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkParams {
    /// Soft upper bound on chunk length, in characters.
    pub target_size: usize,
    /// Minimum characters carried from the end of one chunk into the next.
    pub overlap_size: usize,
    /// Characters that end a sentence; a run of them counts as one boundary.
    pub terminators: Vec<char>,
}

impl ChunkParams {
    pub fn new(target_size: usize, overlap_size: usize) -> Self {
        Self {
            target_size,
            overlap_size,
            terminators: DEFAULT_TERMINATORS.chars().collect(),
        }
    }

    /// Replace the terminator set.
    pub fn with_terminators(mut self, terminators: &str) -> Self {
        self.terminators = terminators.chars().collect();
        self
    }

    /// Reject sizes the chunker cannot honor.
    ///
    /// An overlap as large as the window would let windows grow without
    /// bound, so `overlap_size` must be strictly below `target_size`.
    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(Error::InvalidChunkParams(
                "target_size must be > 0".to_string(),
            ));
        }
        if self.overlap_size >= self.target_size {
            return Err(Error::InvalidChunkParams(format!(
                "overlap_size ({}) must be smaller than target_size ({})",
                self.overlap_size, self.target_size
            )));
        }
        if self.terminators.is_empty() {
            return Err(Error::InvalidChunkParams(
                "at least one sentence terminator is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self::new(600, 150)
    }
}

/// Split `text` into sentences, keeping each terminator run with the
/// sentence it ends.
///
/// Whitespace after a terminator belongs to the terminator run, so
/// concatenating the returned slices reproduces the text minus any
/// whitespace-only segments. Whitespace-only segments are dropped.
pub fn split_sentences<'a>(text: &'a str, terminators: &[char]) -> Vec<&'a str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut in_boundary = false;

    for (i, c) in text.char_indices() {
        if terminators.contains(&c) {
            in_boundary = true;
        } else if in_boundary && !c.is_whitespace() {
            push_sentence(&mut sentences, &text[start..i]);
            start = i;
            in_boundary = false;
        }
    }
    push_sentence(&mut sentences, &text[start..]);

    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, segment: &'a str) {
    if !segment.trim().is_empty() {
        sentences.push(segment);
    }
}

/// Split text into overlapping, sentence-aligned chunks.
///
/// # Guarantees
///
/// - At least one chunk is always returned; when no sentence is found the
///   input is returned as-is.
/// - No sentence is split across chunks.
/// - With `overlap_size > 0`, each chunk after the first begins with at
///   least one full sentence of its predecessor.
/// - A chunk exceeds `target_size` only when it holds a single over-long
///   sentence or its overlap seed plus one sentence is longer than the
///   window.
///
/// # Errors
///
/// [`Error::InvalidChunkParams`] when `params` fails [`ChunkParams::validate`].
pub fn chunk_text(text: &str, params: &ChunkParams) -> Result<Vec<String>> {
    params.validate()?;

    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut window_len = 0usize;

    for sentence in split_sentences(text, &params.terminators) {
        let sentence_len = char_len(sentence);

        if window_len + sentence_len > params.target_size && !window.is_empty() {
            chunks.push(join_window(&window));
            window = overlap_seed(&window, params.overlap_size);
            window_len = window.iter().map(|s| char_len(s)).sum();
        }

        window.push(sentence);
        window_len += sentence_len;
    }

    if !window.is_empty() {
        chunks.push(join_window(&window));
    }

    if chunks.is_empty() {
        chunks.push(text.to_string());
    }

    Ok(chunks)
}

/// Chunk a document body into [`Chunk`] records.
///
/// Indices are contiguous from 0; each chunk gets a fresh UUID and the
/// SHA-256 of its content. Embeddings are left empty for the pipeline.
pub fn build_chunks(document_id: &str, text: &str, params: &ChunkParams) -> Result<Vec<Chunk>> {
    let texts = chunk_text(text, params)?;
    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(i, content)| make_chunk(document_id, i as i64, content))
        .collect())
}

/// Trailing sentences of `window` covering at least `overlap_size` chars.
fn overlap_seed<'a>(window: &[&'a str], overlap_size: usize) -> Vec<&'a str> {
    let mut seed = Vec::new();
    let mut carried = 0usize;

    for sentence in window.iter().rev() {
        if carried >= overlap_size {
            break;
        }
        seed.push(*sentence);
        carried += char_len(sentence);
    }

    seed.reverse();
    seed
}

fn join_window(window: &[&str]) -> String {
    window.concat().trim().to_string()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// SHA-256 hex digest of a chunk's content.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(document_id: &str, index: i64, content: String) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        hash: content_hash(&content),
        content,
        embedding: None,
    }
}
