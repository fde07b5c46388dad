use crate::config::non_empty;
use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub const GEMINI_EMBEDDING_MODEL: &str = "models/text-embedding-004";
pub const GEMINI_EMBEDDING_DIMENSION: usize = 768;
const DEFAULT_EMBEDDINGS_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";

/// Configuration for Gemini API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embeddings_url: String,
}

impl GeminiConfig {
    /// Read `GEMINI_API_KEY` / `GEMINI_EMBEDDINGS_URL`; `None` without a key
    pub fn from_lookup<F>(lookup: &F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_empty(lookup, "GEMINI_API_KEY")?;
        let embeddings_url = non_empty(lookup, "GEMINI_EMBEDDINGS_URL")
            .unwrap_or_else(|| DEFAULT_EMBEDDINGS_URL.to_string());

        Some(GeminiConfig {
            api_key,
            embeddings_url,
        })
    }
}

/// Client for the Gemini embedding endpoint
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    /// Get the client configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Generate the embedding for one text
    pub async fn get_embedding(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: GEMINI_EMBEDDING_MODEL,
            content: EmbeddingContent {
                parts: vec![Part { text }],
            },
        };

        let url = format!("{}?key={}", self.config.embeddings_url, self.config.api_key);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::ModelLoad(format!("{}: {}", GEMINI_EMBEDDING_MODEL, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = format!("API request failed: {} {}", status, error_text);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RagError::Credential(message),
                _ => RagError::ModelLoad(message),
            });
        }

        let response_data: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::retrieval(format!("malformed embedding response: {}", e)))?;

        Ok(Embedding {
            values: response_data.embedding.values,
        })
    }
}

impl Embedder for GeminiClient {
    fn model_id(&self) -> &str {
        GEMINI_EMBEDDING_MODEL
    }

    fn dimension(&self) -> usize {
        GEMINI_EMBEDDING_DIMENSION
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            debug!("Requesting Gemini embedding {}/{}", i + 1, texts.len());
            embeddings.push(self.get_embedding(text).await?);
        }

        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.get_embedding(text).await
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'static str,
    content: EmbeddingContent<'a>,
}

#[derive(Serialize)]
struct EmbeddingContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_api_key() {
        assert!(GeminiConfig::from_lookup(&|_: &str| None).is_none());

        let config = GeminiConfig::from_lookup(&|key: &str| {
            (key == "GEMINI_API_KEY").then(|| "g-key".to_string())
        })
        .unwrap();
        assert_eq!(config.api_key, "g-key");
        assert_eq!(config.embeddings_url, DEFAULT_EMBEDDINGS_URL);
    }

    #[test]
    fn test_request_shape() {
        let request = EmbeddingRequest {
            model: GEMINI_EMBEDDING_MODEL,
            content: EmbeddingContent {
                parts: vec![Part { text: "hanging indent" }],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "models/text-embedding-004");
        assert_eq!(json["content"]["parts"][0]["text"], "hanging indent");
    }
}
