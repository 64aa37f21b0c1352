use anyhow::{Context, Result};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::database::{ScoredChunk, VectorStore};
use crate::document::{split_text, SplitterConfig};
use crate::providers::traits::CompletionProvider;

const QUERY_CACHE_SIZE: usize = 128;

/// Chunks, embeds and indexes notes, and finds the chunks closest to a question.
pub struct Retriever {
    provider: Arc<dyn CompletionProvider>,
    store: Arc<dyn VectorStore>,
    splitter: SplitterConfig,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl Retriever {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
        splitter: SplitterConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(QUERY_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            store,
            splitter,
            query_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Replaces whatever was indexed for `source` with the chunks of `text`.
    pub async fn index_text(&self, source: &str, text: &str) -> Result<usize> {
        let chunks = split_text(text, &self.splitter);
        if chunks.is_empty() {
            log::warn!("No text to index for {}", source);
            return Ok(0);
        }

        log::info!("Embedding {} chunks from {}", chunks.len(), source);
        let embeddings = self
            .provider
            .generate_embeddings(&chunks)
            .await
            .context("Failed to embed document chunks")?;

        let stored = self.store.replace_source(source, chunks, embeddings).await?;
        log::info!("Indexed {} chunks from {} in {} store", stored, source, self.store.backend());
        Ok(stored)
    }

    /// Top `k` chunks of `source` for `query`; `None` searches every source.
    pub async fn retrieve_relevant_chunks(
        &self,
        query: &str,
        source: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let embedding = self.query_embedding(query).await?;
        let results = self.store.search(&embedding, source, k).await?;
        log::debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    async fn query_embedding(&self, query: &str) -> Result<Vec<f32>> {
        let cached = self.query_cache.lock().get(query).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let embedding = self
            .provider
            .generate_embedding(query)
            .await
            .context("Failed to embed query")?;
        self.query_cache.lock().put(query.to_string(), embedding.clone());
        Ok(embedding)
    }
}

pub fn build_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
