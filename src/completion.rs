use crate::config::{non_empty, parse_or};
use crate::error::{RagError, Result};
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Settings for an OpenAI-compatible chat-completion endpoint
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionConfig {
    /// `Ok(None)` when `OPENAI_API_KEY` is absent: answers fall back to raw passages
    pub fn from_lookup<F>(lookup: &F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(api_key) = non_empty(lookup, "OPENAI_API_KEY") else {
            return Ok(None);
        };

        Ok(Some(CompletionConfig {
            base_url: non_empty(lookup, "OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: non_empty(lookup, "OWL_COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            temperature: parse_or(lookup, "OWL_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            max_tokens: parse_or(lookup, "OWL_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
        }))
    }
}

/// Produces an answer from retrieved context and the user's question
#[allow(async_fn_in_trait)]
pub trait CompletionProvider {
    async fn complete(&self, context: &str, question: &str) -> Result<String>;
}

/// System prompt carrying the retrieved passages
pub fn system_prompt(context: &str) -> String {
    format!(
        "You are a writing assistant for the Purdue Online Writing Lab (OWL). \
Answer the user's question about citations, formatting, email etiquette or academic writing \
using only the context below. If the context does not contain the answer, say so.\n\n\
Context:\n{}",
        context
    )
}

/// Client for `POST {base_url}/chat/completions`
pub struct ChatCompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RagError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(ChatCompletionClient { config, client })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl CompletionProvider for ChatCompletionClient {
    async fn complete(&self, context: &str, question: &str) -> Result<String> {
        let system = system_prompt(context);
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
        };

        let url = self.endpoint();
        debug!("Requesting completion from {} ({})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.trim())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    RagError::Credential(format!("could not reach {}: {}", url, e))
                } else {
                    RagError::retrieval(format!("completion request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_failure(status, &self.config.model, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::retrieval(format!("failed to parse completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::retrieval("No response generated"))
    }
}

fn classify_failure(status: StatusCode, model: &str, body: &str) -> RagError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RagError::Credential(format!("{}: {}", status, body))
        }
        StatusCode::NOT_FOUND => RagError::ModelLoad(format!("model {}: {} {}", model, status, body)),
        _ => RagError::retrieval(format!("completion endpoint returned {}: {}", status, body)),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}
