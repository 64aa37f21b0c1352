#[cfg(test)]
pub mod mock;
pub mod ollama;
pub mod openai_compat;
pub mod traits;
pub mod utils;

use anyhow::Result;
use crate::config::{ProviderConfig, ProviderKind};
use ollama::OllamaProvider;
use openai_compat::OpenAICompatProvider;
use std::sync::Arc;
use traits::CompletionProvider;

pub struct ProviderFactory;

impl ProviderFactory {
    pub fn from_config(config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>> {
        let provider: Arc<dyn CompletionProvider> = match config.kind {
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(config)?),
            ProviderKind::OpenAI => Arc::new(OpenAICompatProvider::new(config)?),
        };
        log::info!(
            "Using {} provider with model {} at {}",
            provider.name(),
            config.model,
            config.api_url
        );
        Ok(provider)
    }
}
