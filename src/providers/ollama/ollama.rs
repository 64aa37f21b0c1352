use async_trait::async_trait;
use anyhow::{Result, anyhow};
use crate::config::ProviderConfig;
use crate::providers::traits::CompletionProvider;
use crate::providers::utils::{check_response, endpoint};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Talks to a local `ollama serve` over its native REST API.
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: Url,
    model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// `llama3.2` is served as `llama3.2:latest`; both spellings refer to the same model.
    fn model_matches(requested: &str, served: &str) -> bool {
        if requested == served {
            return true;
        }
        !requested.contains(':') && served == format!("{}:latest", requested)
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = endpoint(&self.base_url, "api/chat")?;
        log::debug!("Ollama chat request to {} with model {}", url, self.model);

        let response = self.client
            .post(url)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt
                    }
                ],
                "stream": false,
                "options": {
                    "temperature": self.temperature,
                    "num_predict": self.max_tokens
                }
            }))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach Ollama at {}: {}", self.base_url, e))?;

        let response_json = check_response(response).await?;

        response_json
            .get("message")
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

        let url = endpoint(&self.base_url, "api/embed")?;
        let response = self.client
            .post(url)
            .json(&json!({
                "model": self.embedding_model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach Ollama at {}: {}", self.base_url, e))?;

        let response_json = check_response(response).await?;
        let embeddings: Vec<Vec<f32>> = response_json
            .get("embeddings")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| anyhow!("Embedding response has no 'embeddings' field"))?;

        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Expected {} embeddings from model {}, got {}",
                texts.len(),
                self.embedding_model,
                embeddings.len()
            ));
        }

        Ok(embeddings)
    }

    async fn get_model_info(&self) -> Result<String> {
        let url = endpoint(&self.base_url, "api/tags")?;
        let response = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Ollama is not reachable at {}: {}", self.base_url, e))?;

        let response_json = check_response(response).await?;
        let served: Vec<&str> = response_json
            .get("models")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();

        match served.iter().find(|name| Self::model_matches(&self.model, name)) {
            Some(name) => Ok(name.to_string()),
            None => Err(anyhow!(
                "Model '{}' is not available. Run `ollama pull {}`",
                self.model,
                self.model
            )),
        }
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_base_url, ProviderKind};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OllamaProvider {
        let config = ProviderConfig {
            kind: ProviderKind::Ollama,
            model: "llama3.2".to_string(),
            embedding_model: "all-minilm".to_string(),
            api_url: parse_base_url("test", &server.uri()).unwrap(),
            api_key: None,
            temperature: 0.2,
            max_tokens: 800,
            timeout_secs: 5,
        };
        OllamaProvider::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_complete_sends_non_streaming_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.2",
                "stream": false,
                "options": { "num_predict": 800 },
                "messages": [{ "role": "user", "content": "What is entropy?" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": { "role": "assistant", "content": "A measure of disorder." },
                "done": true
            })))
            .mount(&server)
            .await;

        let reply = provider_for(&server).complete("What is entropy?").await.unwrap();
        assert_eq!(reply, "A measure of disorder.");
    }

    #[tokio::test]
    async fn test_complete_surfaces_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "model \"llama3.2\" not found, try pulling it first"
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_embeddings_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({ "model": "all-minilm" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "all-minilm",
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let vectors = provider
            .generate_embeddings(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_embeddings_count_mismatch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.1, 0.2]]
            })))
            .mount(&server)
            .await;

        let result = provider_for(&server)
            .generate_embeddings(&["a".to_string(), "b".to_string()])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_model_info_accepts_latest_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{ "name": "all-minilm:latest" }, { "name": "llama3.2:latest" }]
            })))
            .mount(&server)
            .await;

        let model = provider_for(&server).get_model_info().await.unwrap();
        assert_eq!(model, "llama3.2:latest");
    }

    #[tokio::test]
    async fn test_model_info_reports_missing_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
            .mount(&server)
            .await;

        let err = provider_for(&server).get_model_info().await.unwrap_err();
        assert!(err.to_string().contains("ollama pull llama3.2"));
    }

    #[test]
    fn test_model_matches() {
        assert!(OllamaProvider::model_matches("llama3.2", "llama3.2:latest"));
        assert!(OllamaProvider::model_matches("llama3.2:1b", "llama3.2:1b"));
        assert!(!OllamaProvider::model_matches("llama3.2:1b", "llama3.2:latest"));
        assert!(!OllamaProvider::model_matches("llama3", "llama3.2:latest"));
    }
}
