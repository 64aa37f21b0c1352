use async_trait::async_trait;
use anyhow::Result;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Runs a single non-streaming completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.generate_embeddings(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    /// Embeds every text, returning one vector per input in the same order.
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Probes the backend and returns the model in use.
    async fn get_model_info(&self) -> Result<String>;

    fn name(&self) -> &'static str;
}
