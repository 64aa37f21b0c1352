//! Splits extracted notes into overlapping chunks for embedding.

use text_splitter::{ChunkConfig, TextSplitter};

#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
        }
    }
}

/// Splits at the coarsest boundary that fits (paragraphs, lines, sentences,
/// words, then characters). Chunks are trimmed and never empty.
pub fn split_text(text: &str, config: &SplitterConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Overlap must stay below the chunk size; config validation enforces this,
    // but direct callers may not.
    let overlap = config.chunk_overlap.min(config.chunk_size.saturating_sub(1));
    let chunk_config = match ChunkConfig::new(config.chunk_size.max(1)).with_overlap(overlap) {
        Ok(chunk_config) => chunk_config,
        Err(e) => {
            log::warn!("Invalid overlap {} for chunk size {}: {}", overlap, config.chunk_size, e);
            ChunkConfig::new(config.chunk_size.max(1))
        }
    };

    let splitter = TextSplitter::new(chunk_config);
    let chunks: Vec<String> = splitter
        .chunks(text)
        .filter(|chunk| !chunk.trim().is_empty())
        .map(str::to_string)
        .collect();

    log::debug!(
        "Split {} characters into {} chunks (size {}, overlap {})",
        text.chars().count(),
        chunks.len(),
        config.chunk_size,
        overlap
    );

    chunks
}
