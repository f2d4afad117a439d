//! Embedding generation
//!
//! This module provides an abstraction over embedding providers with:
//! - A trait for different embedding backends
//! - HTTP embedding backend
//! - Batch processing for efficiency
//!
//! A document's chunks are always embedded by a single provider: fallback
//! happens at whole-batch granularity, and the provider that succeeds is
//! recorded as the document's `embedding_provider`. Mixed-provider batches
//! would make the stored vectors mutually incomparable.

mod http_backend;

pub use http_backend::*;

use crate::error::{Error, Result};
use crate::providers::{run_with_fallback, ProviderRegistry, ProviderSpec};
use async_trait::async_trait;
use tracing::info;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Build the HTTP embedder for a provider spec
pub fn create_embedder(
    registry: &ProviderRegistry,
    spec: &ProviderSpec,
) -> Result<Box<dyn Embedder>> {
    let endpoint = registry
        .endpoint(spec.id)
        .ok_or_else(|| Error::Config(format!("No endpoint for provider {}", spec.id)))?;
    let embedder = HttpEmbedder::new(endpoint, spec)?;
    Ok(Box::new(embedder))
}

/// Helper to embed in batches
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let embeddings = embedder.embed(batch.to_vec()).await?;
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}

/// One document's embeddings, produced by exactly one provider
#[derive(Debug)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    /// Provider that embedded the whole batch
    pub provider: String,
    pub dimension: usize,
}

/// Run the embedding stage over a document's chunk texts.
///
/// The fallback orchestrator retries the entire batch against the next
/// candidate on failure; a partially embedded batch is never returned.
pub async fn embed_chunks(
    registry: &ProviderRegistry,
    texts: &[String],
    batch_size: usize,
    provider_hint: Option<&str>,
) -> Result<EmbeddingBatch> {
    let candidates = registry.embedding_candidates(provider_hint);

    let outcome = run_with_fallback("embedding", &candidates, |spec| {
        let embedder = create_embedder(registry, &spec);
        async move {
            let embedder = embedder?;
            let vectors = embed_in_batches(embedder.as_ref(), texts, batch_size).await?;
            if vectors.len() != texts.len() {
                return Err(Error::Embedding(format!(
                    "Provider returned {} vectors for {} inputs",
                    vectors.len(),
                    texts.len()
                )));
            }
            Ok((vectors, embedder.dimension()))
        }
    })
    .await?;

    let (vectors, dimension) = outcome.value;
    info!(
        provider = %outcome.provider,
        vectors = vectors.len(),
        dimension,
        "Embedding batch complete"
    );

    Ok(EmbeddingBatch {
        vectors,
        provider: outcome.provider,
        dimension,
    })
}

/// Embed a single question with a specific provider (no fallback: the
/// vector must come from the same provider as the stored chunks).
pub async fn embed_question(
    registry: &ProviderRegistry,
    spec: &ProviderSpec,
    question: &str,
) -> Result<Vec<f32>> {
    let embedder = create_embedder(registry, spec)?;
    let mut vectors = embedder.embed(vec![question.to_string()]).await?;
    if vectors.len() != 1 {
        return Err(Error::Embedding(format!(
            "Expected one vector for the question, got {}",
            vectors.len()
        )));
    }
    Ok(vectors.remove(0))
}
