//! Shared test doubles for pipeline tests.

use async_trait::async_trait;
use coachloop_core::error::LlmError;
use coachloop_core::llm::{Completion, CompletionClient, CompletionOptions};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A completion client that replays a scripted sequence of replies.
///
/// Each `complete` call pops the next scripted reply; running out of script
/// is a test bug and panics. Prompts are recorded for assertions.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    embedding: Vec<f32>,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            embedding: vec![1.0, 0.0, 0.0],
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_user_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .map(|(_, user)| user.clone())
            .unwrap_or_default()
    }

    pub fn last_system_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .map(|(system, _)| system.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        _options: CompletionOptions,
    ) -> Result<Completion, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedClient ran out of scripted replies");
        reply.map(|text| Completion {
            text,
            model: "scripted-model".into(),
            usage: None,
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|_| self.embedding.clone()).collect())
    }
}
