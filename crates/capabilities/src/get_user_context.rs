//! Capability: fetch the learner's current context.

use async_trait::async_trait;
use coachloop_core::capability::{Capability, CapabilityOutcome};
use coachloop_core::context::ContextProvider;
use coachloop_core::error::CapabilityError;
use std::sync::Arc;

pub struct GetUserContextCapability {
    provider: Arc<dyn ContextProvider>,
}

impl GetUserContextCapability {
    pub fn new(provider: Arc<dyn ContextProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Capability for GetUserContextCapability {
    fn name(&self) -> &str {
        "get_user_context"
    }

    fn description(&self) -> &str {
        "Fetch the learner's current curriculum position: week number, this week's topics, difficulty level, and preferences."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "string",
                    "description": "The learner identifier"
                }
            },
            "required": ["user_id"]
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "user_id": "string",
            "week": "integer (1-based curriculum week)",
            "topics": "array of strings",
            "difficulty": "beginner | intermediate | advanced"
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        let user_id = arguments["user_id"].as_str().unwrap_or_default();

        let context = self
            .provider
            .user_context(user_id)
            .await
            .map_err(|e| CapabilityError::ExecutionFailed {
                name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        match context {
            Some(ctx) => Ok(CapabilityOutcome::ok(serde_json::to_value(&ctx).map_err(
                |e| CapabilityError::ExecutionFailed {
                    name: self.name().to_string(),
                    reason: e.to_string(),
                },
            )?)),
            None => Ok(CapabilityOutcome::failed(format!(
                "no context found for learner '{user_id}'"
            ))),
        }
    }
}
