//! Shared test doubles for capability tests.

use async_trait::async_trait;
use coachloop_core::error::LlmError;
use coachloop_core::llm::{Completion, CompletionClient, CompletionOptions};

/// A completion client with one fixed reply and a unit embedding.
pub struct StubClient {
    pub reply: String,
}

impl StubClient {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for StubClient {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _options: CompletionOptions,
    ) -> Result<Completion, LlmError> {
        Ok(Completion {
            text: self.reply.clone(),
            model: "stub-model".into(),
            usage: None,
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}
