//! Embedding provider abstraction and the batched [`Embedder`].
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! Providers are constructed by the caller and injected into an
//! [`Embedder`], which owns batching, bounded concurrency, and timeouts,
//! and converts provider failures into [`Error::Embedding`] /
//! [`Error::EmbeddingTimeout`].
//!
//! # Provider Selection
//!
//! ```rust
//! # use doc_rag::config::EmbeddingConfig;
//! # use doc_rag::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod http;

pub use http::{OllamaProvider, OpenAIProvider};

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Trait for embedding providers.
///
/// Implementations map a batch of texts to one vector per text, in input
/// order. Failures are reported as [`anyhow::Error`]; the [`Embedder`]
/// classifies them.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Embedder ============

/// Runs an injected provider with batching, bounded concurrency, and
/// timeouts.
///
/// Query embedding is one call bounded by `query_timeout`. Chunk embedding
/// splits texts into `batch_size` batches and keeps at most
/// `max_concurrency` of them in flight; results come back in input order.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrency: usize,
    query_timeout: Duration,
    batch_timeout: Duration,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::from_config(provider, &EmbeddingConfig::default())
    }

    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            max_concurrency: config.max_concurrency.max(1),
            query_timeout: config.query_timeout(),
            batch_timeout: config.batch_timeout(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed a search query.
    ///
    /// # Errors
    ///
    /// [`Error::EmbeddingTimeout`] if the provider exceeds `query_timeout`,
    /// [`Error::Embedding`] for any provider failure or an empty response.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let vectors = self.embed_with_timeout(&texts, self.query_timeout).await?;
        vectors.into_iter().next().ok_or_else(|| Error::Embedding {
            provider: self.model_name().to_string(),
            message: "Empty embedding response".to_string(),
        })
    }

    /// Embed chunk texts, returning one vector per text in input order.
    ///
    /// The first failing batch aborts the whole call.
    pub async fn embed_chunks(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(self.batch_size))
            .map(|batch| self.embed_with_timeout(batch, self.batch_timeout))
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        debug!(
            model = self.model_name(),
            texts = texts.len(),
            "embedded chunk batch set"
        );
        Ok(vectors)
    }

    async fn embed_with_timeout(
        &self,
        texts: &[String],
        timeout: Duration,
    ) -> Result<Vec<Vec<f32>>> {
        let provider = self.model_name().to_string();

        let vectors = match tokio::time::timeout(timeout, self.provider.embed_batch(texts)).await {
            Ok(Ok(vectors)) => vectors,
            Ok(Err(e)) => {
                warn!(model = %provider, error = %e, "embedding request failed");
                return Err(Error::Embedding {
                    provider,
                    message: format!("{:#}", e),
                });
            }
            Err(_) => {
                warn!(model = %provider, timeout_ms = timeout.as_millis() as u64, "embedding request timed out");
                return Err(Error::EmbeddingTimeout { provider, timeout });
            }
        };

        if vectors.len() != texts.len() {
            return Err(Error::Embedding {
                provider,
                message: format!(
                    "expected {} embeddings, provider returned {}",
                    texts.len(),
                    vectors.len()
                ),
            });
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Encodes each text as `[len, first byte]` after an optional delay.
    struct CountingProvider {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, t.bytes().next().unwrap_or(0) as f32])
                .collect())
        }
    }

    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_chunks_keep_input_order_across_batches() {
        let provider = Arc::new(CountingProvider::new(Duration::from_millis(5)));
        let embedder = Embedder::new(provider.clone())
            .with_batch_size(2)
            .with_max_concurrency(3);
        let texts: Vec<String> = (0..7).map(|i| "x".repeat(i + 1)).collect();

        let vectors = embedder.embed_chunks(&texts).await.unwrap();

        assert_eq!(vectors.len(), 7);
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v[0], (i + 1) as f32);
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_chunk_concurrency_is_bounded() {
        let provider = Arc::new(CountingProvider::new(Duration::from_millis(20)));
        let embedder = Embedder::new(provider.clone())
            .with_batch_size(1)
            .with_max_concurrency(2);
        let texts: Vec<String> = (0..6).map(|i| format!("t{}", i)).collect();

        embedder.embed_chunks(&texts).await.unwrap();

        assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_chunk_list_skips_provider() {
        let provider = Arc::new(CountingProvider::new(Duration::ZERO));
        let embedder = Embedder::new(provider.clone());
        assert!(embedder.embed_chunks(&[]).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_timeout_is_an_error() {
        let provider = Arc::new(CountingProvider::new(Duration::from_secs(5)));
        let embedder = Embedder::new(provider).with_query_timeout(Duration::from_millis(20));

        let err = embedder.embed_query("slow").await.unwrap_err();

        match err {
            Error::EmbeddingTimeout { timeout, .. } => {
                assert_eq!(timeout, Duration::from_millis(20));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disabled_provider_surfaces_embedding_error() {
        let embedder = Embedder::new(Arc::new(DisabledProvider));
        let err = embedder.embed_query("anything").await.unwrap_err();
        match err {
            Error::Embedding { provider, message } => {
                assert_eq!(provider, "disabled");
                assert!(message.contains("disabled"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_is_rejected() {
        let embedder = Embedder::new(Arc::new(ShortProvider));
        let err = embedder
            .embed_chunks(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding { .. }));
    }

    #[test]
    fn test_create_provider_disabled() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "disabled");
        assert_eq!(provider.dims(), 0);
    }

    #[test]
    fn test_create_provider_unknown() {
        let config = EmbeddingConfig {
            provider: "magic".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_provider(&config).is_err());
    }
}
