//! TOML configuration parsing and validation.
//!
//! See `config/docrag.example.toml` for a complete example. Every section
//! except `[db]` has defaults; [`load_config`] rejects values the chunker,
//! retriever, or embedder cannot honor before any work starts.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunk::{ChunkParams, DEFAULT_TERMINATORS};
use crate::search::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Chunk window sizes for the create path, with an optional override for
/// the update path.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,
    #[serde(default = "default_terminators")]
    pub terminators: String,
    /// Sizes used when a document is edited. Falls back to the create sizes.
    #[serde(default)]
    pub update: Option<ChunkProfile>,
}

/// Which write path's chunk sizes to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    Create,
    Update,
}

impl WritePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePath::Create => "create",
            WritePath::Update => "update",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProfile {
    pub target_size: usize,
    pub overlap_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            overlap_size: default_overlap_size(),
            terminators: default_terminators(),
            update: None,
        }
    }
}

fn default_target_size() -> usize {
    600
}
fn default_overlap_size() -> usize {
    150
}
fn default_terminators() -> String {
    DEFAULT_TERMINATORS.to_string()
}

impl ChunkingConfig {
    /// Parameters for chunking a newly created document.
    pub fn create_params(&self) -> ChunkParams {
        ChunkParams::new(self.target_size, self.overlap_size).with_terminators(&self.terminators)
    }

    /// Parameters for re-chunking an edited document.
    pub fn update_params(&self) -> ChunkParams {
        match self.update {
            Some(p) => {
                ChunkParams::new(p.target_size, p.overlap_size).with_terminators(&self.terminators)
            }
            None => self.create_params(),
        }
    }

    pub fn params_for(&self, path: WritePath) -> ChunkParams {
        match path {
            WritePath::Create => self.create_params(),
            WritePath::Update => self.update_params(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_chunks_per_doc")]
    pub max_chunks_per_doc: usize,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default = "default_tie_tolerance")]
    pub tie_tolerance: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_chunks_per_doc: default_max_chunks_per_doc(),
            candidate_multiplier: default_candidate_multiplier(),
            tie_tolerance: default_tie_tolerance(),
        }
    }
}

fn default_limit() -> usize {
    5
}
fn default_max_chunks_per_doc() -> usize {
    2
}
fn default_candidate_multiplier() -> usize {
    3
}
fn default_tie_tolerance() -> f64 {
    0.01
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            max_chunks_per_doc: self.max_chunks_per_doc,
            candidate_multiplier: self.candidate_multiplier,
            tie_tolerance: self.tie_tolerance,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request HTTP timeout, also the bound on one chunk batch.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_concurrency() -> usize {
    4
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_query_timeout_secs() -> u64 {
    10
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Upper bound on one embedding batch, covering every retry and backoff.
    pub fn batch_timeout(&self) -> Duration {
        let backoff = (1..=self.max_retries)
            .map(|attempt| 1u64 << (attempt - 1).min(5))
            .fold(0u64, u64::saturating_add);
        let attempts = u64::from(self.max_retries) + 1;
        Duration::from_secs(
            self.timeout_secs
                .saturating_mul(attempts)
                .saturating_add(backoff),
        )
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    config
        .chunking
        .create_params()
        .validate()
        .context("invalid [chunking] section")?;
    config
        .chunking
        .update_params()
        .validate()
        .context("invalid [chunking.update] section")?;

    // Validate retrieval
    let retrieval = &config.retrieval;
    if retrieval.default_limit == 0 {
        bail!("retrieval.default_limit must be >= 1");
    }
    if retrieval.max_chunks_per_doc == 0 {
        bail!("retrieval.max_chunks_per_doc must be >= 1");
    }
    if retrieval.candidate_multiplier == 0 {
        bail!("retrieval.candidate_multiplier must be >= 1");
    }
    if !retrieval.tie_tolerance.is_finite() || retrieval.tie_tolerance < 0.0 {
        bail!("retrieval.tie_tolerance must be a finite value >= 0");
    }

    // Validate embedding
    let embedding = &config.embedding;
    if embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if embedding.max_concurrency == 0 {
        bail!("embedding.max_concurrency must be > 0");
    }
    if embedding.is_enabled() {
        if embedding.dims.is_none() || embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                embedding.provider
            );
        }
        if embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                embedding.provider
            );
        }
    }

    match embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
