//! OpenAI-compatible client implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/v1/chat/completions` and `/v1/embeddings`.

use async_trait::async_trait;
use coachloop_core::error::LlmError;
use coachloop_core::llm::{Completion, CompletionClient, CompletionOptions, Usage};
use serde::Deserialize;
use tracing::{debug, warn};

/// An OpenAI-compatible completion and embedding client.
///
/// The completion call is the dominant latency in the digest pipeline
/// (commonly tens of seconds for multi-insight synthesis), so the request
/// timeout is configurable rather than hardcoded.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: embedding_model.into(),
            client,
        }
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            api_key,
            model,
            "text-embedding-3-small",
            60,
        )
    }

    /// Create an Ollama client (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
            "nomic-embed-text",
            120,
        )
    }

    fn map_status(status: u16, body: String) -> LlmError {
        match status {
            429 => LlmError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => {
                LlmError::AuthenticationFailed("Invalid API key or insufficient permissions".into())
            }
            _ => LlmError::ApiError {
                status_code: status,
                message: body,
            },
        }
    }

    fn map_transport(e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(e.to_string())
        } else {
            LlmError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: CompletionOptions,
    ) -> std::result::Result<Completion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": options.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(client = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion service returned error");
            return Err(Self::map_status(status, error_body));
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| LlmError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::EmptyResponse("no choices in response".into()))?;

        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse(
                "completion reply had no content".into(),
            ));
        }

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Completion {
            text,
            model: api_response.model,
            usage,
        })
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": texts,
            "encoding_format": "float",
        });

        debug!(
            client = %self.name,
            model = %self.embedding_model,
            count = texts.len(),
            "Sending embedding request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, error_body));
        }

        let api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| LlmError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        if api_resp.data.len() != texts.len() {
            return Err(LlmError::EmptyResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                api_resp.data.len()
            )));
        }

        Ok(api_resp.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn health_check(&self) -> std::result::Result<bool, LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(Self::map_transport)?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_constructor() {
        let client = OpenAiCompatClient::openai("sk-test", "gpt-4o-mini");
        assert_eq!(client.name(), "openai");
        assert!(client.base_url.contains("api.openai.com"));
    }

    #[test]
    fn ollama_constructor() {
        let client = OpenAiCompatClient::ollama(None, "llama3");
        assert_eq!(client.name(), "ollama");
        assert!(client.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let client =
            OpenAiCompatClient::new("x", "http://host/v1/", "k", "m", "e", 30);
        assert_eq!(client.base_url, "http://host/v1");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiCompatClient::map_status(429, String::new()),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            OpenAiCompatClient::map_status(401, String::new()),
            LlmError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            OpenAiCompatClient::map_status(500, "boom".into()),
            LlmError::ApiError {
                status_code: 500,
                ..
            }
        ));
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hello!"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{
            "data": [
                {"embedding": [0.1, 0.2, 0.3], "index": 0},
                {"embedding": [0.4, 0.5, 0.6], "index": 1}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }
}
