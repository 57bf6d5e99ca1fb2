//! Shared test doubles for agent loop tests.

use async_trait::async_trait;
use coachloop_core::capability::{Capability, CapabilityOutcome};
use coachloop_core::error::{CapabilityError, LlmError};
use coachloop_core::llm::{Completion, CompletionClient, CompletionOptions};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A completion client that replays a scripted sequence of replies.
///
/// Each `complete` call pops the next scripted reply; running out of script
/// is a test bug and panics. Prompts are recorded for assertions.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
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
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}

/// A capability that returns whatever data it was constructed with.
pub struct CannedCapability {
    pub cap_name: &'static str,
    pub data: serde_json::Value,
    pub approval: bool,
}

impl CannedCapability {
    pub fn new(cap_name: &'static str, data: serde_json::Value) -> Self {
        Self {
            cap_name,
            data,
            approval: false,
        }
    }

    pub fn with_approval(mut self) -> Self {
        self.approval = true;
        self
    }
}

#[async_trait]
impl Capability for CannedCapability {
    fn name(&self) -> &str {
        self.cap_name
    }
    fn description(&self) -> &str {
        "Returns canned data"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }
    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({})
    }
    fn requires_approval(&self) -> bool {
        self.approval
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        Ok(CapabilityOutcome::ok(self.data.clone()))
    }
}

/// A capability that always fails internally.
pub struct FlakyCapability;

#[async_trait]
impl Capability for FlakyCapability {
    fn name(&self) -> &str {
        "flaky"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }
    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({})
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        Err(CapabilityError::ExecutionFailed {
            name: "flaky".into(),
            reason: "backend unavailable".into(),
        })
    }
}

/// A capability that sleeps past any reasonable timeout.
pub struct SlowCapability;

#[async_trait]
impl Capability for SlowCapability {
    fn name(&self) -> &str {
        "slow"
    }
    fn description(&self) -> &str {
        "Sleeps for an hour"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }
    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({})
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(CapabilityOutcome::ok(serde_json::Value::Null))
    }
}
