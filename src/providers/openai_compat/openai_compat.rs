use async_trait::async_trait;
use anyhow::{Result, anyhow};
use crate::config::ProviderConfig;
use crate::providers::traits::CompletionProvider;
use crate::providers::utils::{check_response, endpoint};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Any server speaking the OpenAI chat completions protocol
/// (OpenAI itself, LM Studio, vLLM, or Ollama's `/v1` endpoint).
#[derive(Clone)]
pub struct OpenAICompatProvider {
    api_key: Option<String>,
    client: Client,
    base_url: Url,
    model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAICompatProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            client,
            base_url: config.api_url.clone(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompatProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = endpoint(&self.base_url, "chat/completions")?;

        let response = self.authorized(self.client.post(url))
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt
                    }
                ],
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
                "stream": false
            }))
            .send()
            .await?;

        let response_json = check_response(response).await?;

        response_json
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                let debug_json = serde_json::to_string_pretty(&response_json).unwrap_or_default();
                anyhow!("Invalid response format. Response JSON: {}", debug_json)
            })
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = endpoint(&self.base_url, "embeddings")?;
        let response = self.authorized(self.client.post(url))
            .json(&json!({
                "model": self.embedding_model,
                "input": texts,
            }))
            .send()
            .await?;

        let response_json = check_response(response).await?;
        let mut data: Vec<(usize, Vec<f32>)> = response_json
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("Embedding response has no 'data' array"))?
            .iter()
            .enumerate()
            .map(|(position, item)| -> Result<(usize, Vec<f32>)> {
                let index = item
                    .get("index")
                    .and_then(Value::as_u64)
                    .map(|i| i as usize)
                    .unwrap_or(position);
                let embedding = item
                    .get("embedding")
                    .cloned()
                    .ok_or_else(|| anyhow!("Embedding item {} has no vector", position))?;
                Ok((index, serde_json::from_value(embedding)?))
            })
            .collect::<Result<_>>()?;

        if data.len() != texts.len() {
            return Err(anyhow!("Expected {} embeddings, got {}", texts.len(), data.len()));
        }

        // The API may return items out of order; `index` is authoritative.
        data.sort_by_key(|(index, _)| *index);
        Ok(data.into_iter().map(|(_, embedding)| embedding).collect())
    }

    async fn get_model_info(&self) -> Result<String> {
        let url = endpoint(&self.base_url, "models")?;
        let response = self.authorized(self.client.get(url)).send().await?;
        check_response(response).await?;
        Ok(self.model.clone())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_base_url, ProviderKind};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAICompatProvider {
        let config = ProviderConfig {
            kind: ProviderKind::OpenAI,
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_url: parse_base_url("test", &format!("{}/v1", server.uri())).unwrap(),
            api_key: Some("sk-test".to_string()),
            temperature: 0.2,
            max_tokens: 800,
            timeout_secs: 5,
        };
        OpenAICompatProvider::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_complete_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Mitochondria." } }]
            })))
            .mount(&server)
            .await;

        let reply = provider_for(&server).complete("powerhouse of the cell?").await.unwrap();
        assert_eq!(reply, "Mitochondria.");
    }

    #[tokio::test]
    async fn test_embeddings_are_ordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0] },
                    { "index": 0, "embedding": [1.0, 0.0] }
                ]
            })))
            .mount(&server)
            .await;

        let vectors = provider_for(&server)
            .generate_embeddings(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
