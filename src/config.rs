use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::document::SplitterConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL for {name}: {value}")]
    InvalidUrl { name: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAI,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" | "openai-compat" => Ok(ProviderKind::OpenAI),
            other => Err(ConfigError::Invalid(format!(
                "Unknown LLM_PROVIDER '{}'. Expected 'ollama' or 'openai'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub embedding_model: String,
    pub api_url: Url,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub vector_store_dir: PathBuf,
    pub qdrant_url: Option<String>,
    pub qdrant_collection: String,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_k: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let kind: ProviderKind = get("LLM_PROVIDER", "ollama").parse()?;

        let (url_var, url_default) = match kind {
            ProviderKind::Ollama => ("OLLAMA_API_URL", "http://localhost:11434"),
            ProviderKind::OpenAI => ("OPENAI_API_URL", "https://api.openai.com/v1"),
        };
        let raw_url = get(url_var, url_default);
        let api_url = parse_base_url(url_var, &raw_url)?;

        let provider = ProviderConfig {
            kind,
            model: get("LLM_MODEL", "llama3.2"),
            embedding_model: get("EMBEDDING_MODEL", "all-minilm"),
            api_url,
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            temperature: parse_or("LLM_TEMPERATURE", lookup("LLM_TEMPERATURE"), 0.2),
            max_tokens: parse_or("LLM_MAX_TOKENS", lookup("LLM_MAX_TOKENS"), 800),
            timeout_secs: parse_or("LLM_TIMEOUT_SECS", lookup("LLM_TIMEOUT_SECS"), 300),
        };

        let config = Self {
            provider,
            vector_store_dir: PathBuf::from(get("VECTOR_STORE_DIR", "./vector_store")),
            qdrant_url: lookup("QDRANT_URL").filter(|u| !u.trim().is_empty()),
            qdrant_collection: get("QDRANT_COLLECTION", "study_notes"),
            database_path: PathBuf::from(get("DATABASE_PATH", "data/study.db")),
            upload_dir: PathBuf::from(get("UPLOAD_DIR", "data")),
            chunk_size: parse_or("CHUNK_SIZE", lookup("CHUNK_SIZE"), 800),
            chunk_overlap: parse_or("CHUNK_OVERLAP", lookup("CHUNK_OVERLAP"), 150),
            retrieval_k: parse_or("RETRIEVAL_K", lookup("RETRIEVAL_K"), 3),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("CHUNK_SIZE must be greater than 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.retrieval_k == 0 {
            return Err(ConfigError::Invalid("RETRIEVAL_K must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn splitter(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    /// Overrides the chat model, e.g. from a command line flag.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.provider.model = model;
        }
        self
    }

    /// Overrides the Ollama server URL. Ignored for other providers.
    pub fn with_ollama_url(mut self, url: Option<String>) -> Result<Self, ConfigError> {
        let Some(url) = url else {
            return Ok(self);
        };
        if self.provider.kind != ProviderKind::Ollama {
            log::warn!("Ignoring --ollama-url {} because LLM_PROVIDER is not ollama", url);
            return Ok(self);
        }
        self.provider.api_url = parse_base_url("--ollama-url", &url)?;
        Ok(self)
    }
}

/// Parses a base URL and guarantees a trailing slash so `Url::join` keeps the path.
pub fn parse_base_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&with_slash).map_err(|_| ConfigError::InvalidUrl {
        name,
        value: raw.to_string(),
    })
}

fn parse_or<T: FromStr + std::fmt::Display + Copy>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                log::warn!("Invalid value '{}' for {}, using default {}", value, name, default);
                default
            }
        },
    }
}
