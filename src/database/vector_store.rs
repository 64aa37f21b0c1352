use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
    #[error("Expected {expected} embeddings, got {actual}")]
    EmbeddingCount { expected: usize, actual: usize },
}

impl From<tokio_rusqlite::Error> for VectorStoreError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        VectorStoreError::Operation(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Similarity index over note chunks. Chunks are grouped by their source document.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drops every chunk of `source` and stores `chunks` in its place.
    async fn replace_source(
        &self,
        source: &str,
        chunks: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, VectorStoreError>;

    /// Returns up to `k` chunks, most similar first. With `source` set, only
    /// chunks of that source are considered.
    async fn search(
        &self,
        embedding: &[f32],
        source: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    async fn delete_source(&self, source: &str) -> Result<(), VectorStoreError>;

    async fn count(&self) -> Result<usize, VectorStoreError>;

    fn backend(&self) -> &'static str;
}

pub(crate) fn check_counts(chunks: &[String], embeddings: &[Vec<f32>]) -> Result<(), VectorStoreError> {
    if chunks.len() != embeddings.len() {
        return Err(VectorStoreError::EmbeddingCount {
            expected: chunks.len(),
            actual: embeddings.len(),
        });
    }
    Ok(())
}

/// Cosine similarity; `None` when dimensions differ or either vector is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).unwrap().abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_check_counts() {
        let chunks = vec!["a".to_string(), "b".to_string()];
        assert!(check_counts(&chunks, &[vec![1.0], vec![2.0]]).is_ok());
        assert!(matches!(
            check_counts(&chunks, &[vec![1.0]]),
            Err(VectorStoreError::EmbeddingCount { expected: 2, actual: 1 })
        ));
    }
}
